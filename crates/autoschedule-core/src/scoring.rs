//! Multi-objective slot scoring.
//!
//! Every candidate slot that survived the hard filters (working hours, buffer,
//! busy time) receives a weighted score built from independent objective
//! terms. Each term yields a value in `[0.0, 1.0]`; the total is the weighted
//! sum. Scores only order slots and tasks within one run.
//!
//! | Term | 1.0 | 0.0 | Neutral (0.5) |
//! |------|-----|-----|---------------|
//! | `energy_fit` | start hour inside the task's energy range | outside | no energy level or no range configured |
//! | `time_preference` | start hour in the preferred band | other band | no preference / ANYTIME |
//! | `deadline` | earliest slot of an overdue or dated task | latest slot without a due date | n/a (flat low curve without a due date) |
//! | `project_proximity` | next to a same-project task | isolated | grouping off or no project |
//! | `priority` | HIGH | NONE / absent | n/a |

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::calendar::BusyInterval;
use crate::error::ConfigError;
use crate::settings::AutoScheduleSettings;
use crate::task::{PreferredTime, Priority, SchedulableTask};

pub const TERM_ENERGY_FIT: &str = "energy_fit";
pub const TERM_TIME_PREFERENCE: &str = "time_preference";
pub const TERM_DEADLINE: &str = "deadline";
pub const TERM_PROJECT_PROXIMITY: &str = "project_proximity";
pub const TERM_PRIORITY: &str = "priority";

/// Neutral score for a term that does not apply to the task.
const NEUTRAL: f64 = 0.5;
/// Decay horizon of the no-due-date urgency curve.
const UNDATED_DECAY_MINUTES: f64 = 7.0 * 24.0 * 60.0;
/// Decay horizon of the curves used once a slot misses the due date.
const LATE_DECAY_MINUTES: f64 = 7.0 * 24.0 * 60.0;

/// Local hour bands used for time-of-day preferences (`[start, end)`).
pub const MORNING_HOURS: (u32, u32) = (5, 12);
pub const AFTERNOON_HOURS: (u32, u32) = (12, 17);
pub const EVENING_HOURS: (u32, u32) = (17, 22);

/// Individual objective term with weight and score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveTerm {
    /// Term name
    pub name: String,
    /// Weight for this term (0.0 to 1.0)
    pub weight: f64,
    /// Raw score (0.0 to 1.0, higher is better)
    pub score: f64,
    /// Weighted contribution
    pub contribution: f64,
}

impl ObjectiveTerm {
    pub fn new(name: impl Into<String>, weight: f64, score: f64) -> Self {
        let weight = weight.clamp(0.0, 1.0);
        let score = score.clamp(0.0, 1.0);
        Self {
            name: name.into(),
            weight,
            score,
            contribution: weight * score,
        }
    }
}

/// Complete scoring breakdown for explainability
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub terms: Vec<ObjectiveTerm>,
    /// Total weighted score
    pub total_score: f64,
}

impl ScoreBreakdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a term to the breakdown
    pub fn add_term(&mut self, term: ObjectiveTerm) {
        self.total_score += term.contribution;
        self.terms.push(term);
    }

    /// Look up a term by name
    pub fn term(&self, name: &str) -> Option<&ObjectiveTerm> {
        self.terms.iter().find(|t| t.name == name)
    }

    /// Get the top contributing term
    pub fn top_term(&self) -> Option<&ObjectiveTerm> {
        self.terms
            .iter()
            .max_by(|a, b| a.contribution.total_cmp(&b.contribution))
    }
}

/// Weights for each objective term
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveWeights {
    /// Match the task's energy tier to the configured hours
    pub energy_fit: f64,
    /// Honor MORNING / AFTERNOON / EVENING preferences
    pub time_preference: f64,
    /// Prefer earlier slots, strongly when a due date approaches
    pub deadline: f64,
    /// Keep same-project tasks next to each other
    pub project_proximity: f64,
    /// Task priority; constant per task, it ranks tasks rather than slots
    pub priority: f64,
}

impl ObjectiveWeights {
    /// Default balanced weights
    pub fn balanced() -> Self {
        Self {
            energy_fit: 0.25,
            time_preference: 0.15,
            deadline: 0.30,
            project_proximity: 0.10,
            priority: 0.20,
        }
    }

    /// Focus on meeting deadlines
    pub fn deadline_focused() -> Self {
        Self {
            energy_fit: 0.15,
            time_preference: 0.10,
            deadline: 0.45,
            project_proximity: 0.05,
            priority: 0.25,
        }
    }

    /// Focus on sustainable pace (energy and time of day)
    pub fn energy_focused() -> Self {
        Self {
            energy_fit: 0.40,
            time_preference: 0.25,
            deadline: 0.15,
            project_proximity: 0.10,
            priority: 0.10,
        }
    }

    /// Normalize weights to sum to 1.0
    pub fn normalize(&mut self) {
        let sum = self.energy_fit
            + self.time_preference
            + self.deadline
            + self.project_proximity
            + self.priority;
        if sum > 0.0 {
            self.energy_fit /= sum;
            self.time_preference /= sum;
            self.deadline /= sum;
            self.project_proximity /= sum;
            self.priority /= sum;
        }
    }

    /// Validate that all weights are in [0.0, 1.0]
    pub fn validate(&self) -> Result<(), ConfigError> {
        let weights = [
            (TERM_ENERGY_FIT, self.energy_fit),
            (TERM_TIME_PREFERENCE, self.time_preference),
            (TERM_DEADLINE, self.deadline),
            (TERM_PROJECT_PROXIMITY, self.project_proximity),
            (TERM_PRIORITY, self.priority),
        ];

        for (name, weight) in weights {
            if !(0.0..=1.0).contains(&weight) {
                return Err(ConfigError::invalid(
                    &format!("weights.{name}"),
                    format!("must be in [0.0, 1.0], got {weight}"),
                ));
            }
        }

        Ok(())
    }
}

impl Default for ObjectiveWeights {
    fn default() -> Self {
        Self::balanced()
    }
}

/// Everything needed to score one candidate slot.
#[derive(Debug, Clone)]
pub struct ScoringContext<'a> {
    pub task: &'a SchedulableTask,
    pub settings: &'a AutoScheduleSettings,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Hour of the slot start in the user's timezone
    pub local_start_hour: u32,
    /// Reference time for urgency
    pub now: DateTime<Utc>,
    /// Slots of already placed tasks from the same project
    pub project_neighbors: &'a [BusyInterval],
}

/// Multi-objective slot scoring engine
#[derive(Debug, Clone)]
pub struct SlotScoringEngine {
    weights: ObjectiveWeights,
    project_proximity: Duration,
}

impl SlotScoringEngine {
    pub fn new(weights: ObjectiveWeights, project_proximity_minutes: u32) -> Self {
        Self {
            weights,
            project_proximity: Duration::minutes(i64::from(project_proximity_minutes)),
        }
    }

    pub fn weights(&self) -> &ObjectiveWeights {
        &self.weights
    }

    /// Score a single slot in context
    pub fn score_slot(&self, ctx: &ScoringContext) -> ScoreBreakdown {
        let mut breakdown = ScoreBreakdown::new();

        breakdown.add_term(ObjectiveTerm::new(
            TERM_ENERGY_FIT,
            self.weights.energy_fit,
            self.calculate_energy_fit(ctx),
        ));
        breakdown.add_term(ObjectiveTerm::new(
            TERM_TIME_PREFERENCE,
            self.weights.time_preference,
            self.calculate_time_preference(ctx),
        ));
        breakdown.add_term(ObjectiveTerm::new(
            TERM_DEADLINE,
            self.weights.deadline,
            self.calculate_deadline_score(ctx),
        ));
        breakdown.add_term(ObjectiveTerm::new(
            TERM_PROJECT_PROXIMITY,
            self.weights.project_proximity,
            self.calculate_project_proximity(ctx),
        ));
        breakdown.add_term(ObjectiveTerm::new(
            TERM_PRIORITY,
            self.weights.priority,
            priority_score(ctx.task.priority),
        ));

        breakdown
    }

    fn calculate_energy_fit(&self, ctx: &ScoringContext) -> f64 {
        let Some(level) = ctx.task.energy_level else {
            return NEUTRAL;
        };
        let Some((start, end)) = ctx.settings.energy_range(level) else {
            return NEUTRAL;
        };

        if hour_in(ctx.local_start_hour, (u32::from(start), u32::from(end))) {
            1.0
        } else {
            0.0
        }
    }

    fn calculate_time_preference(&self, ctx: &ScoringContext) -> f64 {
        let band = match ctx.task.preferred_time {
            Some(PreferredTime::Morning) => MORNING_HOURS,
            Some(PreferredTime::Afternoon) => AFTERNOON_HOURS,
            Some(PreferredTime::Evening) => EVENING_HOURS,
            Some(PreferredTime::Anytime) | None => return NEUTRAL,
        };

        if hour_in(ctx.local_start_hour, band) {
            1.0
        } else {
            0.0
        }
    }

    /// Earlier is better, and any due date ranks above none.
    ///
    /// - already overdue: 1.0 falling towards 0.5 over a week of lead
    /// - slot before the due date: 1.0 (now) falling linearly to 0.5 (due)
    /// - slot missing a future due date: 0.35 to 0.45, below every on-time slot
    /// - no due date: 0.2 to 0.3
    fn calculate_deadline_score(&self, ctx: &ScoringContext) -> f64 {
        let lead_minutes = (ctx.start - ctx.now).num_minutes().max(0) as f64;

        match ctx.task.due_date {
            Some(due) if due <= ctx.now => {
                1.0 - 0.5 * (lead_minutes / LATE_DECAY_MINUTES).min(1.0)
            }
            Some(due) if ctx.end > due => {
                0.35 + 0.1 * (-lead_minutes / LATE_DECAY_MINUTES).exp()
            }
            Some(due) => {
                let horizon = (due - ctx.now).num_minutes().max(1) as f64;
                0.5 + 0.5 * (1.0 - lead_minutes / horizon).clamp(0.0, 1.0)
            }
            None => 0.2 + 0.1 * (-lead_minutes / UNDATED_DECAY_MINUTES).exp(),
        }
    }

    fn calculate_project_proximity(&self, ctx: &ScoringContext) -> f64 {
        if !ctx.settings.group_by_project || ctx.task.project_id.is_none() {
            return NEUTRAL;
        }

        let reach = Duration::minutes(i64::from(ctx.settings.buffer_minutes)) + self.project_proximity;
        let adjacent = ctx
            .project_neighbors
            .iter()
            .any(|n| n.padded(reach).overlaps(ctx.start, ctx.end));
        if adjacent {
            1.0
        } else {
            0.0
        }
    }
}

impl Default for SlotScoringEngine {
    fn default() -> Self {
        Self::new(ObjectiveWeights::default(), 30)
    }
}

/// Priority as a score term.
pub fn priority_score(priority: Option<Priority>) -> f64 {
    match priority {
        Some(Priority::High) => 1.0,
        Some(Priority::Medium) => 0.66,
        Some(Priority::Low) => 0.33,
        Some(Priority::None) | None => 0.0,
    }
}

fn hour_in(hour: u32, (start, end): (u32, u32)) -> bool {
    hour >= start && hour < end
}

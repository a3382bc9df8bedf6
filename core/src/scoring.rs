//! Scoring rules.

use crate::types::Difficulty;

pub fn base_points(difficulty: Difficulty) -> u32 {
    match difficulty {
        Difficulty::Easy => 5,
        Difficulty::Medium => 10,
        Difficulty::Hard => 15,
    }
}

pub fn speed_bonus(difficulty: Difficulty) -> u32 {
    match difficulty {
        Difficulty::Easy => 1,
        Difficulty::Medium => 3,
        Difficulty::Hard => 6,
    }
}

/// Points for a correct answer.  The speed bonus applies when the
/// answer came within the first half of the time limit.
pub fn points_for(difficulty: Difficulty, response_time: f64, time_limit: u64) -> u32 {
    let mut points = base_points(difficulty);
    if response_time <= time_limit as f64 / 2.0 {
        points += speed_bonus(difficulty);
    }
    points
}

/// Clamp a client-reported response time into `[0, Tq + 1]`.  Anything
/// outside the window, including NaN, counts as the slowest possible.
pub fn clamp_response_time(response_time: f64, time_limit: u64) -> f64 {
    let max = (time_limit + 1) as f64;
    if response_time.is_finite() && (0.0..=max).contains(&response_time) {
        response_time
    } else {
        max
    }
}

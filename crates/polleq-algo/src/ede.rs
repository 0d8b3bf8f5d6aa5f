//! Kolm-Pollak weights and the Equally-Distributed Equivalent (EDE) distance.
//!
//! ```text
//! kp_factor(d) = exp(-β·α·d)
//! EDE          = -1/(β·α) · ln( Σ pop·kp_factor(d) / Σ pop )      β ≠ 0
//!              = Σ pop·d / Σ pop                                   β = 0
//! ```
//!
//! A population that all travels the EDE distance has the same welfare as the observed
//! distribution. With β < 0 the EDE is never below the mean and grows with inequality.

/// Largest KP factor the MIP engine handles reliably.
pub const MAX_KP_FACTOR: f64 = 9e19;

pub fn kp_factor(beta: f64, alpha: f64, distance: f64) -> f64 {
    (-beta * alpha * distance).exp()
}

/// EDE of (population, distance) pairs. `None` when the total population is zero.
///
/// The KP mean is taken around the largest exponent, so long distances on the
/// meter scale do not overflow.
pub fn ede<I>(pairs: I, beta: f64, alpha: f64) -> Option<f64>
where
    I: IntoIterator<Item = (f64, f64)>,
{
    let pairs: Vec<(f64, f64)> = pairs.into_iter().collect();
    let total_pop: f64 = pairs.iter().map(|(pop, _)| pop).sum();
    if total_pop <= 0.0 {
        return None;
    }
    if beta == 0.0 {
        let weighted: f64 = pairs.iter().map(|(pop, d)| pop * d).sum();
        return Some(weighted / total_pop);
    }
    let k = -beta * alpha;
    let shift = pairs
        .iter()
        .filter(|(pop, _)| *pop > 0.0)
        .map(|(_, d)| k * d)
        .fold(f64::NEG_INFINITY, f64::max);
    let scaled: f64 = pairs
        .iter()
        .map(|(pop, d)| pop * (k * d - shift).exp())
        .sum();
    Some((shift + (scaled / total_pop).ln()) / k)
}

/// Converts a model objective into EDE units.
///
/// The β ≠ 0 objective is the population-mean KP factor; the β = 0 objective already is
/// a mean distance.
pub fn ede_from_objective(objective: f64, beta: f64, alpha: f64) -> f64 {
    if beta == 0.0 {
        objective
    } else {
        -objective.ln() / (beta * alpha)
    }
}

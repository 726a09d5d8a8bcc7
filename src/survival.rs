//! Annual survival probabilities for mothers and children.
//!
//! Both hazards are Siler-style: a constant extrinsic term and a senescent term
//! for the mother, a declining juvenile term for children. Family composition
//! enters through sibling competition and sibling help, the mother's death through
//! a fixed relative risk on her children. All functions are pure.

use crate::config::{MaternalMortalityCurve, ModelParams, MortalityLevel};
use crate::constants::*;
use crate::types::{AgeSet, LifeHistoryContext};

/// J-curve coefficients (alpha, beta, gamma) per childbirth mortality level.
const J_CURVE_LOW: (f64, f64, f64) = (1.424218e-05, 5.415419e-04, 7.492639e-03);
const J_CURVE_MEDIUM: (f64, f64, f64) = (1.394538e-05, 5.268179e-04, 8.448535e-03);
const J_CURVE_HIGH: (f64, f64, f64) = (1.236674e-05, 4.478437e-04, 9.056053e-03);

/// Exponential-curve coefficients (alpha, beta) per childbirth mortality level.
const E_CURVE_LOW: (f64, f64) = (0.002928, 0.1);
const E_CURVE_MEDIUM: (f64, f64) = (0.000485, 0.181221);
const E_CURVE_HIGH: (f64, f64) = (1e-6, 0.5);

/// Hazard of dying in childbirth at `mother_age`.
///
/// Zero when the level is `None`.
pub fn maternal_mortality(
    curve: MaternalMortalityCurve,
    level: MortalityLevel,
    mother_age: u32,
    age_at_maturity: u32,
    extrinsic: f64,
) -> f64 {
    let age = mother_age as f64;
    match curve {
        MaternalMortalityCurve::JShaped => {
            let (alpha, beta, gamma) = match level {
                MortalityLevel::None => return 0.0,
                MortalityLevel::Low => J_CURVE_LOW,
                MortalityLevel::Medium => J_CURVE_MEDIUM,
                MortalityLevel::High => J_CURVE_HIGH,
            };
            alpha * age * age - beta * age + gamma
        }
        MaternalMortalityCurve::Exponential => {
            let (alpha, beta) = match level {
                MortalityLevel::None => return 0.0,
                MortalityLevel::Low => E_CURVE_LOW,
                MortalityLevel::Medium => E_CURVE_MEDIUM,
                MortalityLevel::High => E_CURVE_HIGH,
            };
            alpha * (beta * (age - age_at_maturity as f64)).exp() + (extrinsic - alpha)
        }
    }
}

/// Extra weight on a child's hazard from a newborn sibling.
#[inline]
fn newborn_competition(level: MortalityLevel) -> f64 {
    match level {
        MortalityLevel::None => 0.0,
        MortalityLevel::Low => 0.5,
        MortalityLevel::Medium | MortalityLevel::High => 1.0,
    }
}

/// Per-sibling weight at sibling age `s`. Used with a positive sign for
/// competition and a negative sign for help.
#[inline]
fn sibling_term(level: MortalityLevel, sibling_age: u32) -> f64 {
    let s = sibling_age as f64;
    match level {
        MortalityLevel::None => 0.0,
        MortalityLevel::Low => 0.5 - 0.03333 * s,
        MortalityLevel::Medium => 1.0 - 0.06666 * s,
        MortalityLevel::High => 1.0 - 0.0357 * s,
    }
}

/// Survival model for one parameter set and catalog geometry.
#[derive(Clone, Copy, Debug)]
pub struct SurvivalModel<'a> {
    params: &'a ModelParams,
    age_at_maturity: u32,
    mother_age_max: u32,
}

impl<'a> SurvivalModel<'a> {
    pub fn new(params: &'a ModelParams, age_at_maturity: u32, mother_age_max: u32) -> Self {
        Self {
            params,
            age_at_maturity,
            mother_age_max,
        }
    }

    pub fn for_context(ctx: &'a LifeHistoryContext) -> Self {
        Self::new(&ctx.params, ctx.age_at_maturity, ctx.mother_age_max)
    }

    /// Age at which a mother is dead. Passing it as `mother_age` to
    /// [`Self::child`] gives a motherless child's survival.
    #[inline(always)]
    pub fn mother_age_max(&self) -> u32 {
        self.mother_age_max
    }

    /// Probability that a mother aged `mother_age` survives the year.
    ///
    /// The family composition does not enter the mother's hazard.
    pub fn mother(&self, mother_age: u32, gives_birth: bool) -> f64 {
        if mother_age >= self.mother_age_max {
            return 0.0;
        }
        let siler = &self.params.siler;
        let senescent = siler.a3 * (siler.b3 * (mother_age - self.age_at_maturity) as f64).exp();
        let childbirth = if gives_birth {
            maternal_mortality(
                self.params.maternal_mortality_curve,
                self.params.childbirth_mortality,
                mother_age,
                self.age_at_maturity,
                siler.a2,
            )
        } else {
            0.0
        };
        (-(siler.a2 + senescent + childbirth)).exp()
    }

    /// Probability that the child aged `child_age` in `family` survives the year.
    ///
    /// `child_age == 0` is this year's newborn. A `mother_age` at or beyond the
    /// maximum means the mother is dead.
    pub fn child(&self, mother_age: u32, family: AgeSet, gives_birth: bool, child_age: u32) -> f64 {
        let motherless = mother_age >= self.mother_age_max;
        if motherless && child_age <= MOTHER_DEPENDENT_AGE {
            return 0.0;
        }

        let siler = &self.params.siler;
        let mut hazard = siler.a1 * (-siler.b1 * child_age as f64).exp();
        if motherless {
            hazard *= MOTHERLESS_HAZARD_FACTOR;
        }

        let competition = self.params.sibling_competition;
        let help = self.params.sibling_help;
        let mut weight = 0.0;
        if gives_birth && child_age != 0 {
            weight += newborn_competition(competition);
        }
        for sibling in family.ages().filter(|&s| s != child_age) {
            weight += sibling_term(competition, sibling);
            if sibling >= SIBLING_HELP_MIN_AGE {
                weight -= sibling_term(help, sibling);
            }
        }

        (-hazard * (1.0 + weight).max(0.0)).exp()
    }
}

//! Seeded template generator for grade-appropriate problems.
//!
//! Every problem pairs a statement with the formulation it encodes and the
//! expected answer computed directly from the drawn numbers.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use crate::capability::ProblemSource;
use crate::error::{Result, ReviewError};
use crate::model::{Answer, Difficulty, Problem, ProblemMetadata, ProblemSpec, Topic};

/// Statement, formulation and answer of a problem before metadata is attached.
struct Draft {
    statement: String,
    formulation: String,
    answer: Answer,
}

impl Draft {
    fn new(statement: String, formulation: String, answer: Answer) -> Self {
        Self {
            statement,
            formulation,
            answer,
        }
    }
}

/// Template-based [`ProblemSource`].
///
/// The n-th problem drawn for a spec depends only on the seed, the spec and
/// `n`, so two sources built with the same seed hand out the same sequence.
#[derive(Debug)]
pub struct TemplateProblemSource {
    seed: u64,
    draws: AtomicU64,
}

impl TemplateProblemSource {
    /// Creates a source with a fixed seed.
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self {
            seed,
            draws: AtomicU64::new(0),
        }
    }

    /// Creates a source seeded from the thread RNG.
    #[must_use]
    pub fn from_entropy() -> Self {
        let mut rng = rand::rng();
        Self::new(rng.random::<u64>())
    }

    /// Returns the seed this source was created with.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Generates the `draw`-th problem for `spec`.
    ///
    /// # Errors
    ///
    /// Returns `ReviewError::GenerationFailure` when the grade level is too low
    /// for the requested topic or difficulty.
    pub fn generate_draw(&self, spec: &ProblemSpec, draw: u64) -> Result<Problem> {
        check_grade(spec)?;

        let stream = mix(self.seed, spec, draw);
        let mut rng = ChaCha8Rng::seed_from_u64(stream);

        let draft = match spec.topic {
            Topic::Integers => integers(&mut rng, spec.difficulty),
            Topic::Equations => equations(&mut rng, spec.difficulty),
            Topic::WordProblem => word_problem(&mut rng, spec.difficulty),
            Topic::RealLife => real_life(&mut rng, spec.difficulty),
        };

        Ok(Problem {
            id: format!(
                "{}-{}-g{}-{:08x}",
                spec.topic,
                spec.difficulty,
                spec.grade_level,
                stream & 0xffff_ffff
            ),
            statement: draft.statement,
            formulation: draft.formulation,
            expected_answer: draft.answer,
            metadata: ProblemMetadata::from(*spec),
        })
    }
}

#[async_trait]
impl ProblemSource for TemplateProblemSource {
    async fn generate(&self, spec: &ProblemSpec) -> Result<Problem> {
        let draw = self.draws.fetch_add(1, Ordering::Relaxed);
        self.generate_draw(spec, draw)
    }
}

/// Rejects topic/difficulty combinations beyond the requested grade.
fn check_grade(spec: &ProblemSpec) -> Result<()> {
    let minimum = match (spec.topic, spec.difficulty) {
        (Topic::Equations, _) | (Topic::Integers, Difficulty::Hard) => 6,
        (_, Difficulty::Hard) => 4,
        (Topic::WordProblem, _) => 3,
        _ => return Ok(()),
    };

    if spec.grade_level < minimum {
        return Err(ReviewError::generation(
            spec.topic,
            spec.difficulty,
            format!(
                "no {} {} problems below grade {minimum} (requested grade {})",
                spec.difficulty, spec.topic, spec.grade_level
            ),
        ));
    }
    Ok(())
}

/// FNV-1a over the seed, spec and draw number.
fn mix(seed: u64, spec: &ProblemSpec, draw: u64) -> u64 {
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325 ^ seed;
    let bytes = spec
        .topic
        .as_str()
        .bytes()
        .chain(spec.difficulty.as_str().bytes())
        .chain(spec.grade_level.to_le_bytes())
        .chain(draw.to_le_bytes());
    for byte in bytes {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

// ============================================================================
// Formatting helpers
// ============================================================================

/// Parenthesizes negative numbers so they can follow an operator.
fn operand(n: i64) -> String {
    if n < 0 {
        format!("({n})")
    } else {
        n.to_string()
    }
}

/// Renders `n` as a trailing `+ n` / `- |n|` term, or nothing for zero.
fn tail(n: i64) -> String {
    match n {
        0 => String::new(),
        n if n < 0 => format!(" - {}", n.unsigned_abs()),
        n => format!(" + {n}"),
    }
}

/// Renders `a*x` for statements: `x`, `-x`, `3x`.
fn x_term(a: i64) -> String {
    match a {
        1 => "x".to_string(),
        -1 => "-x".to_string(),
        a => format!("{a}x"),
    }
}

/// Exact answer of `numerator / denominator`.
#[allow(clippy::cast_precision_loss)]
fn ratio(numerator: i64, denominator: i64) -> Answer {
    if denominator != 0 && numerator % denominator == 0 {
        Answer::Integer(numerator / denominator)
    } else {
        Answer::Decimal(numerator as f64 / denominator as f64)
    }
}

fn nonzero(rng: &mut ChaCha8Rng, low: i64, high: i64) -> i64 {
    loop {
        let n = rng.random_range(low..=high);
        if n != 0 {
            return n;
        }
    }
}

// ============================================================================
// Integers
// ============================================================================

fn integers(rng: &mut ChaCha8Rng, difficulty: Difficulty) -> Draft {
    match (difficulty, rng.random_range(0..3_u8)) {
        (Difficulty::Easy, 0) => {
            let morning = rng.random_range(0..=20_i64);
            let rise = rng.random_range(1..=15_i64);
            Draft::new(
                format!("The temperature in the morning was {morning}°C. By noon it had risen by {rise}°C. What was the temperature at noon?"),
                format!("{morning} + {rise}"),
                Answer::Integer(morning + rise),
            )
        }
        (Difficulty::Easy, 1) => {
            let start = rng.random_range(100..=900_i64);
            let climb = rng.random_range(50..=400_i64);
            let descent = rng.random_range(10..=start.min(300));
            Draft::new(
                format!("A hiker starts at {start} m above sea level, climbs {climb} m and then walks down {descent} m. At what height is the hiker now?"),
                format!("{start} + {climb} - {descent}"),
                Answer::Integer(start + climb - descent),
            )
        }
        (Difficulty::Easy, _) => {
            let a = rng.random_range(1..=50_i64);
            let b = rng.random_range(1..=50_i64);
            let c = rng.random_range(1..=a + b);
            Draft::new(
                format!("Find the value of {a} + {b} - {c}."),
                format!("{a} + {b} - {c}"),
                Answer::Integer(a + b - c),
            )
        }
        (Difficulty::Intermediate, 0) => {
            let midnight = rng.random_range(-10..=15_i64);
            let fall = rng.random_range(5..=20_i64);
            let rise = rng.random_range(1..=10_i64);
            Draft::new(
                format!("At midnight the temperature was {midnight}°C. It fell by {fall}°C before dawn and then rose by {rise}°C by morning. What was the morning temperature?"),
                format!("{midnight} - {fall} + {rise}"),
                Answer::Integer(midnight - fall + rise),
            )
        }
        (Difficulty::Intermediate, 1) => {
            let depth = rng.random_range(50..=300_i64);
            let rise = rng.random_range(10..=depth);
            let dive = rng.random_range(20..=200_i64);
            Draft::new(
                format!("A submarine is {depth} m below sea level. It rises {rise} m and then dives {dive} m. What is its position relative to sea level?"),
                format!("-{depth} + {rise} - {dive}"),
                Answer::Integer(-depth + rise - dive),
            )
        }
        (Difficulty::Intermediate, _) => {
            let a = nonzero(rng, -20, 20);
            let b = nonzero(rng, -20, 20);
            let c = nonzero(rng, -20, 20);
            let expression = format!("{} + {} - {}", operand(a), operand(b), operand(c));
            Draft::new(
                format!("Find the value of {expression}."),
                expression,
                Answer::Integer(a + b - c),
            )
        }
        (Difficulty::Hard, 0 | 1) => {
            let rate = rng.random_range(2..=12_i64);
            let minutes = rng.random_range(3..=9_i64);
            let ascent = rng.random_range(1..=rate * minutes);
            Draft::new(
                format!("A diver starts at the surface and descends {rate} m every minute for {minutes} minutes, then rises {ascent} m. What is the diver's position relative to sea level?"),
                format!("-{rate} * {minutes} + {ascent}"),
                Answer::Integer(-rate * minutes + ascent),
            )
        }
        (Difficulty::Hard, _) => {
            let days = rng.random_range(4..=5_i64);
            let mut temps: Vec<i64> = (0..days).map(|_| rng.random_range(-10..=10_i64)).collect();
            // Nudge the last reading so the average is a whole number.
            let sum: i64 = temps.iter().sum();
            if let Some(last) = temps.last_mut() {
                *last -= sum.rem_euclid(days);
            }
            let sum: i64 = temps.iter().sum();
            let listed = temps.iter().map(i64::to_string).collect::<Vec<_>>().join(", ");
            let terms = temps.iter().map(|t| operand(*t)).collect::<Vec<_>>().join(" + ");
            Draft::new(
                format!("Over {days} days the noon temperatures were {listed} (in °C). What was the average temperature?"),
                format!("({terms}) / {days}"),
                ratio(sum, days),
            )
        }
    }
}

// ============================================================================
// Equations
// ============================================================================

fn equations(rng: &mut ChaCha8Rng, difficulty: Difficulty) -> Draft {
    match difficulty {
        Difficulty::Easy => {
            let a = rng.random_range(1..=9_i64);
            let x = rng.random_range(1..=12_i64);
            let b = rng.random_range(1..=20_i64);
            let c = a * x + b;
            Draft::new(
                format!("Solve for x: {} + {b} = {c}", x_term(a)),
                format!("{a}*x + {b} = {c}"),
                Answer::Integer(x),
            )
        }
        Difficulty::Intermediate => {
            let x = nonzero(rng, -10, 15);
            if rng.random_range(0..2_u8) == 0 {
                let a = rng.random_range(2..=9_i64);
                let b = rng.random_range(1..=25_i64);
                let c = a * x - b;
                Draft::new(
                    format!("Solve for x: {} - {b} = {c}", x_term(a)),
                    format!("{a}*x - {b} = {c}"),
                    Answer::Integer(x),
                )
            } else {
                let a = rng.random_range(2..=6_i64);
                let b = nonzero(rng, -9, 9);
                let c = a * (x + b);
                Draft::new(
                    format!("Solve for x: {a}(x{}) = {c}", tail(b)),
                    format!("{a}*(x{}) = {c}", tail(b)),
                    Answer::Integer(x),
                )
            }
        }
        Difficulty::Hard => {
            let a = rng.random_range(3..=9_i64);
            let c = rng.random_range(1..a);
            let x = nonzero(rng, -12, 12);
            let b = rng.random_range(-20..=20_i64);
            let d = (a - c) * x + b;
            Draft::new(
                format!("Solve for x: {}{} = {}{}", x_term(a), tail(b), x_term(c), tail(d)),
                format!("{a}*x{} = {c}*x{}", tail(b), tail(d)),
                Answer::Integer(x),
            )
        }
    }
}

// ============================================================================
// Word problems
// ============================================================================

fn word_problem(rng: &mut ChaCha8Rng, difficulty: Difficulty) -> Draft {
    match difficulty {
        Difficulty::Easy => {
            let x = rng.random_range(2..=40_i64);
            let b = rng.random_range(1..=30_i64);
            Draft::new(
                format!("I think of a number and add {b} to it. The result is {}. What is the number?", x + b),
                format!("x + {b} = {}", x + b),
                Answer::Integer(x),
            )
        }
        Difficulty::Intermediate => {
            if rng.random_range(0..2_u8) == 0 {
                let sister = rng.random_range(5..=15_i64);
                let gap = rng.random_range(2..=8_i64);
                let total = 2 * sister + gap;
                Draft::new(
                    format!("Ravi is {gap} years older than his sister. Together their ages add up to {total}. How old is Ravi's sister?"),
                    format!("x + (x + {gap}) = {total}"),
                    Answer::Integer(sister),
                )
            } else {
                let smallest = rng.random_range(-10..=40_i64);
                let total = 3 * smallest + 3;
                Draft::new(
                    format!("The sum of three consecutive integers is {total}. What is the smallest of them?"),
                    format!("x + (x + 1) + (x + 2) = {total}"),
                    Answer::Integer(smallest),
                )
            }
        }
        Difficulty::Hard => {
            if rng.random_range(0..2_u8) == 0 {
                let son = rng.random_range(4..=14_i64);
                let times = rng.random_range(2..=4_i64);
                let years = rng.random_range(2..=10_i64);
                let total = (times + 1) * son + 2 * years;
                Draft::new(
                    format!("A father is {times} times as old as his son. In {years} years the sum of their ages will be {total}. How old is the son now?"),
                    format!("(x + {years}) + ({times}*x + {years}) = {total}"),
                    Answer::Integer(son),
                )
            } else {
                let x = rng.random_range(2..=30_i64);
                let b = rng.random_range(1..x);
                let c = 2 * x - b;
                Draft::new(
                    format!("Three times a number, decreased by {b}, equals the number increased by {c}. Find the number."),
                    format!("3*x - {b} = x + {c}"),
                    Answer::Integer(x),
                )
            }
        }
    }
}

// ============================================================================
// Real life
// ============================================================================

fn real_life(rng: &mut ChaCha8Rng, difficulty: Difficulty) -> Draft {
    match (difficulty, rng.random_range(0..2_u8)) {
        (Difficulty::Easy, 0) => {
            let price = rng.random_range(5..=60_i64);
            let count = rng.random_range(2..=9_i64);
            Draft::new(
                format!("A notebook costs ₹{price}. How much do {count} notebooks cost in rupees?"),
                format!("{count} * {price}"),
                Answer::Integer(count * price),
            )
        }
        (Difficulty::Easy, _) => {
            let first = rng.random_range(10..=200_i64);
            let second = rng.random_range(10..=200_i64);
            let note = if first + second <= 500 { 500 } else { 2000 };
            Draft::new(
                format!("Meera buys a book for ₹{first} and a pen set for ₹{second}. She pays with a ₹{note} note. How much change does she get?"),
                format!("{note} - ({first} + {second})"),
                Answer::Integer(note - (first + second)),
            )
        }
        (Difficulty::Intermediate, 0) => {
            let speed = rng.random_range(30..=80_i64);
            let hours = rng.random_range(2..=6_i64);
            Draft::new(
                format!("A bus travels at {speed} km/h for {hours} hours. How many kilometres does it cover?"),
                format!("{speed} * {hours}"),
                Answer::Integer(speed * hours),
            )
        }
        (Difficulty::Intermediate, _) => {
            let count = rng.random_range(2..=8_i64);
            let price = rng.random_range(10..=45_i64);
            let budget = count * price + rng.random_range(0..=150_i64);
            Draft::new(
                format!("Asha has ₹{budget}. She buys {count} pens at ₹{price} each. How many rupees does she have left?"),
                format!("{budget} - {count} * {price}"),
                Answer::Integer(budget - count * price),
            )
        }
        (Difficulty::Hard, 0) => {
            let price = rng.random_range(150..=999_i64);
            let percent = 5 * rng.random_range(1..=7_i64);
            Draft::new(
                format!("A jacket is priced at ₹{price}. During a sale it is offered at {percent}% off. What is the sale price in rupees? Give your answer to two decimal places if needed."),
                format!("{price} - {price} * {percent} / 100"),
                ratio(price * (100 - percent), 100),
            )
        }
        (Difficulty::Hard, _) => {
            let first_km = rng.random_range(10..=60_i64);
            let second_km = rng.random_range(10..=60_i64);
            let first_h = rng.random_range(1..=3_i64);
            let second_h = rng.random_range(1..=3_i64);
            Draft::new(
                format!("A cyclist rides {first_km} km in {first_h} h and then {second_km} km in {second_h} h. What is the cyclist's average speed in km/h for the whole trip? Give your answer to two decimal places if needed."),
                format!("({first_km} + {second_km}) / ({first_h} + {second_h})"),
                ratio(first_km + second_km, first_h + second_h),
            )
        }
    }
}

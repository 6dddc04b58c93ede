//! Abstract domain for nil tracking.
//!
//! A value is described by a finite disjunction of [`Outcome`]s. Each outcome
//! is one statically distinguishable result the value may have along some
//! path: zero (nil, false, 0, "") or non-zero. An empty disjunction means no
//! information could be derived. It never means "provably non-zero".

use crate::sink::TraceStep;

/// One alternative of an [`AbstractState`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome<'p> {
    /// Representative type of the alternative (the producing value's type).
    pub type_id: u32,
    /// The value itself is the zero value of its type.
    pub zero: bool,
    /// The memory the value addresses is known to hold a zero value.
    pub pointee_zero: bool,
    /// Call steps that produced this alternative, outermost first. Empty for
    /// alternatives produced in the frame that observes them.
    pub origin: Vec<TraceStep<'p>>,
}

impl<'p> Outcome<'p> {
    pub fn new(type_id: u32, zero: bool) -> Self {
        Self {
            type_id,
            zero,
            pointee_zero: false,
            origin: Vec::new(),
        }
    }

    pub fn with_pointee_zero(mut self, pointee_zero: bool) -> Self {
        self.pointee_zero = pointee_zero;
        self
    }
}

/// Disjunction of outcomes. Order is discovery order and is preserved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AbstractState<'p> {
    outcomes: Vec<Outcome<'p>>,
}

impl<'p> AbstractState<'p> {
    /// No information.
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn single(outcome: Outcome<'p>) -> Self {
        Self {
            outcomes: vec![outcome],
        }
    }

    pub fn from_outcomes(outcomes: Vec<Outcome<'p>>) -> Self {
        Self { outcomes }
    }

    pub fn is_unknown(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Outcome<'p>> {
        self.outcomes.iter()
    }

    pub fn push(&mut self, outcome: Outcome<'p>) {
        self.outcomes.push(outcome);
    }

    /// Append the alternatives of another path.
    pub fn extend(&mut self, other: AbstractState<'p>) {
        self.outcomes.extend(other.outcomes);
    }

    pub fn any_zero(&self) -> bool {
        self.outcomes.iter().any(|o| o.zero)
    }

    pub fn any_non_zero(&self) -> bool {
        self.outcomes.iter().any(|o| !o.zero)
    }

    /// Known, and zero on every alternative.
    pub fn certainly_zero(&self) -> bool {
        !self.is_unknown() && !self.any_non_zero()
    }

    /// Keep only the alternatives whose zero flag equals `zero`.
    pub fn narrowed(&self, zero: bool) -> Self {
        Self {
            outcomes: self
                .outcomes
                .iter()
                .filter(|o| o.zero == zero)
                .cloned()
                .collect(),
        }
    }

    /// Tag every alternative as having been produced beneath `step`.
    pub fn through_call(mut self, step: TraceStep<'p>) -> Self {
        for o in &mut self.outcomes {
            o.origin.insert(0, step);
        }
        self
    }
}

impl<'p> IntoIterator for AbstractState<'p> {
    type Item = Outcome<'p>;
    type IntoIter = std::vec::IntoIter<Outcome<'p>>;

    fn into_iter(self) -> Self::IntoIter {
        self.outcomes.into_iter()
    }
}

impl<'a, 'p> IntoIterator for &'a AbstractState<'p> {
    type Item = &'a Outcome<'p>;
    type IntoIter = std::slice::Iter<'a, Outcome<'p>>;

    fn into_iter(self) -> Self::IntoIter {
        self.outcomes.iter()
    }
}

// ---------------------------------------------------------------------------
// Zero propagation through binary operators
// ---------------------------------------------------------------------------

/// Operator classes with a shared zero-propagation rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOpClass {
    /// `+ -`
    Additive,
    /// `*`
    Multiplicative,
    /// `/ %`
    Quotient,
    /// `& | ^ &^`
    Bitwise,
    /// `<< >>`
    Shift,
    /// `== <= >=`
    Equal,
    /// `!=`
    NotEqual,
    /// `< >`
    Ordered,
    Unsupported,
}

const NON_ZERO_OR_ZERO: &[bool] = &[false, true];
const ZERO: &[bool] = &[true];
const NON_ZERO: &[bool] = &[false];

impl BinOpClass {
    pub fn from_op(op: &str) -> Self {
        match op {
            "+" | "-" => Self::Additive,
            "*" => Self::Multiplicative,
            "/" | "%" => Self::Quotient,
            "&" | "|" | "^" | "&^" => Self::Bitwise,
            "<<" | ">>" => Self::Shift,
            "==" | "<=" | ">=" => Self::Equal,
            "!=" => Self::NotEqual,
            "<" | ">" => Self::Ordered,
            _ => Self::Unsupported,
        }
    }

    /// Zero flags of the alternatives produced for one operand pair.
    pub fn outcomes(self, x_zero: bool, y_zero: bool) -> &'static [bool] {
        match self {
            Self::Additive | Self::Bitwise => arithmetic(x_zero && y_zero),
            Self::Multiplicative => arithmetic(x_zero || y_zero),
            Self::Quotient | Self::Shift => arithmetic(x_zero),
            Self::Equal => match (x_zero, y_zero) {
                (true, true) => NON_ZERO,
                (false, false) => NON_ZERO_OR_ZERO,
                _ => ZERO,
            },
            Self::NotEqual => match (x_zero, y_zero) {
                (true, true) => ZERO,
                (false, false) => NON_ZERO_OR_ZERO,
                _ => NON_ZERO,
            },
            Self::Ordered => NON_ZERO_OR_ZERO,
            Self::Unsupported => &[],
        }
    }
}

/// A result that is not guaranteed zero may be either.
fn arithmetic(guaranteed_zero: bool) -> &'static [bool] {
    if guaranteed_zero {
        ZERO
    } else {
        NON_ZERO_OR_ZERO
    }
}

/// Operand pairs to combine: by position when both sides have the same
/// number of alternatives, otherwise every alternative with every other.
pub fn operand_pairs<'s, 'p>(
    x: &'s AbstractState<'p>,
    y: &'s AbstractState<'p>,
) -> Vec<(&'s Outcome<'p>, &'s Outcome<'p>)> {
    if x.len() == y.len() {
        x.iter().zip(y.iter()).collect()
    } else {
        x.iter()
            .flat_map(|a| y.iter().map(move |b| (a, b)))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Zero-ness of a scalar constant as printed by go/constant.
///
/// `false`, numeric zero (integer, float or complex) and the empty string are
/// zero. Anything unparseable is treated as non-zero.
pub fn const_is_zero(literal: &str) -> bool {
    let lit = literal.trim();
    match lit {
        "false" => return true,
        "true" => return false,
        _ => {}
    }
    if lit.starts_with('"') || lit.starts_with('`') {
        return lit.len() == 2;
    }
    if let Some(inner) = lit.strip_prefix('(').and_then(|s| s.strip_suffix("i)")) {
        return complex_is_zero(inner);
    }
    lit.parse::<f64>().map(|v| v == 0.0).unwrap_or(false)
}

/// `re + im` or `re - im` (the trailing `i` already stripped).
fn complex_is_zero(inner: &str) -> bool {
    let split = inner
        .split_once(" + ")
        .or_else(|| inner.split_once(" - "));
    match split {
        Some((re, im)) => {
            let zero = |s: &str| s.trim().parse::<f64>().map(|v| v == 0.0).unwrap_or(false);
            zero(re) && zero(im)
        }
        None => false,
    }
}

//! Claim basis and per-month assessment value types.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use case_events_core::error::DomainError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use uuid::Uuid;

/// A calendar month, serialized as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Month {
    year: i32,
    month: u32,
}

/// A string that is not a `YYYY-MM` month.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid month {0:?}, expected YYYY-MM")]
pub struct InvalidMonth(pub String);

impl Month {
    /// Builds a month.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMonth` if `month` is not in `1..=12` or `year` is
    /// outside `1..=9999`.
    pub fn new(year: i32, month: u32) -> Result<Self, InvalidMonth> {
        if !(1..=12).contains(&month) || !(1..=9999).contains(&year) {
            return Err(InvalidMonth(format!("{year}-{month}")));
        }
        Ok(Self { year, month })
    }

    /// The year.
    #[must_use]
    pub fn year(self) -> i32 {
        self.year
    }

    /// The month of the year, `1..=12`.
    #[must_use]
    pub fn month(self) -> u32 {
        self.month
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Month {
    type Err = InvalidMonth;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidMonth(s.to_owned());
        let (year, month) = s.split_once('-').ok_or_else(invalid)?;
        let digits = |part: &str, len: usize| {
            part.len() == len && part.bytes().all(|b| b.is_ascii_digit())
        };
        if !digits(year, 4) || !digits(month, 2) {
            return Err(invalid());
        }
        let year = year.parse().map_err(|_| invalid())?;
        let month = month.parse().map_err(|_| invalid())?;
        Self::new(year, month).map_err(|_| invalid())
    }
}

impl Serialize for Month {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Month {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// One month of the claim basis with the amount paid out in excess.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimPeriod {
    /// The month.
    pub month: Month,
    /// Gross overpayment in whole kroner.
    pub gross_overpayment: i64,
}

/// The externally supplied claim basis ("kravgrunnlag") a case is opened on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimBasis {
    /// Identifier of the claim basis in the source system.
    pub claim_basis_id: Uuid,
    /// Overpaid months.
    pub periods: Vec<ClaimPeriod>,
}

impl ClaimBasis {
    /// Checks that the basis has at least one month, no month twice, no
    /// negative amount and a total that fits in an `i64`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` describing the first problem.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.periods.is_empty() {
            return Err(DomainError::Validation(
                "claim basis must contain at least one month".into(),
            ));
        }
        let mut seen = BTreeSet::new();
        let mut total: i64 = 0;
        for period in &self.periods {
            if !seen.insert(period.month) {
                return Err(DomainError::Validation(format!(
                    "claim basis lists {} more than once",
                    period.month
                )));
            }
            if period.gross_overpayment < 0 {
                return Err(DomainError::Validation(format!(
                    "claim basis has a negative amount for {}",
                    period.month
                )));
            }
            total = total.checked_add(period.gross_overpayment).ok_or_else(|| {
                DomainError::Validation(format!(
                    "claim basis total overflows at {}",
                    period.month
                ))
            })?;
        }
        Ok(())
    }

    /// Months of the basis in ascending order.
    #[must_use]
    pub fn months(&self) -> BTreeSet<Month> {
        self.periods.iter().map(|p| p.month).collect()
    }

    /// Gross overpayment for `month`, if it is part of the basis.
    #[must_use]
    pub fn amount_for(&self, month: Month) -> Option<i64> {
        self.periods
            .iter()
            .find(|p| p.month == month)
            .map(|p| p.gross_overpayment)
    }
}

/// Liability judgement for one month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// The overpayment is to be repaid.
    Repay,
    /// The overpayment is waived.
    DoNotRepay,
}

/// The judgement of one month of the claim basis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthAssessment {
    /// The judged month.
    pub month: Month,
    /// The judgement.
    pub decision: Decision,
}

/// Checks a batch of judgements against the claim basis: at least one, every
/// month part of the basis, no month judged twice.
///
/// # Errors
///
/// Returns `DomainError::Validation` describing the first problem.
pub fn validate_assessments(
    basis: &ClaimBasis,
    assessments: &[MonthAssessment],
) -> Result<(), DomainError> {
    if assessments.is_empty() {
        return Err(DomainError::Validation(
            "an assessment must judge at least one month".into(),
        ));
    }
    let months = basis.months();
    let mut seen = BTreeSet::new();
    for assessment in assessments {
        if !months.contains(&assessment.month) {
            return Err(DomainError::Validation(format!(
                "{} is outside the claim basis",
                assessment.month
            )));
        }
        if !seen.insert(assessment.month) {
            return Err(DomainError::Validation(format!(
                "{} is judged more than once",
                assessment.month
            )));
        }
    }
    Ok(())
}

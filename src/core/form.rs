//! Validation for the detail-entry and bulk-upload steps.
//!
//! Every field is checked and all problems are reported together, so one
//! submission produces at most one alert.

use chrono::{Datelike, NaiveDate};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::error::{AppError, ValidationFailure};

const DATE_FORMAT: &str = "%Y-%m-%d";
const MIN_RETIREMENT_AGE: i32 = 18;
pub const MAX_BULK_FILE_BYTES: u64 = 10 * 1024 * 1024;

lazy_static! {
    static ref MEMBER_ID: Regex = Regex::new(r"^[A-Z]{2}\d{6}$").expect("Invalid member id regex");
    static ref BULK_FILE: Regex =
        Regex::new(r"(?i)^[^/\\]+\.(csv|xlsx)$").expect("Invalid bulk file regex");
}

/// Raw detail-entry input as typed by the user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetailsForm {
    pub member_id: String,
    pub date_of_birth: String,
    pub retirement_date: String,
    pub annual_salary: String,
}

/// Detail entry after validation; this is what gets sent to the calculation API
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalculationRequest {
    pub member_id: String,
    pub date_of_birth: NaiveDate,
    pub retirement_date: NaiveDate,
    pub annual_salary: f64,
}

impl DetailsForm {
    pub fn validate(&self) -> Result<CalculationRequest, AppError> {
        let mut failure = ValidationFailure::default();

        let member_id = self.member_id.trim().to_ascii_uppercase();
        if member_id.is_empty() {
            failure.push("member_id", "Member ID is required.");
        } else if !MEMBER_ID.is_match(&member_id) {
            failure.push(
                "member_id",
                "Member ID must be two letters followed by six digits.",
            );
        }

        let date_of_birth =
            parse_date(&self.date_of_birth, "date_of_birth", "Date of birth", &mut failure);
        let retirement_date =
            parse_date(&self.retirement_date, "retirement_date", "Retirement date", &mut failure);

        if let (Some(birth), Some(retirement)) = (date_of_birth, retirement_date) {
            if retirement <= birth {
                failure.push(
                    "retirement_date",
                    "Retirement date must be after the date of birth.",
                );
            } else if age_on(birth, retirement) < MIN_RETIREMENT_AGE {
                failure.push(
                    "retirement_date",
                    format!("Member must be at least {} at retirement.", MIN_RETIREMENT_AGE),
                );
            }
        }

        let annual_salary = match self.annual_salary.trim().replace(',', "").parse::<f64>() {
            Ok(value) if value.is_finite() && value > 0.0 => Some(value),
            _ => {
                failure.push("annual_salary", "Annual salary must be a positive number.");
                None
            }
        };

        match (date_of_birth, retirement_date, annual_salary) {
            (Some(date_of_birth), Some(retirement_date), Some(annual_salary))
                if failure.is_empty() =>
            {
                Ok(CalculationRequest {
                    member_id,
                    date_of_birth,
                    retirement_date,
                    annual_salary,
                })
            }
            _ => Err(AppError::Validation(failure)),
        }
    }
}

fn parse_date(
    value: &str,
    field: &'static str,
    label: &str,
    failure: &mut ValidationFailure,
) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        failure.push(field, format!("{} is required.", label));
        return None;
    }
    match NaiveDate::parse_from_str(value, DATE_FORMAT) {
        Ok(date) => Some(date),
        Err(_) => {
            failure.push(field, format!("{} must be in YYYY-MM-DD format.", label));
            None
        }
    }
}

/// Whole years between `birth` and `on`
fn age_on(birth: NaiveDate, on: NaiveDate) -> i32 {
    let mut age = on.year() - birth.year();
    if (on.month(), on.day()) < (birth.month(), birth.day()) {
        age -= 1;
    }
    age
}

/// File picked on the bulk step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkUpload {
    pub file_name: String,
    pub size_bytes: u64,
}

impl BulkUpload {
    pub fn validate(&self) -> Result<(), AppError> {
        let mut failure = ValidationFailure::default();
        if !BULK_FILE.is_match(self.file_name.trim()) {
            failure.push("file_name", "Upload a .csv or .xlsx file.");
        }
        if self.size_bytes == 0 {
            failure.push("size_bytes", "The selected file is empty.");
        } else if self.size_bytes > MAX_BULK_FILE_BYTES {
            failure.push("size_bytes", "The selected file is larger than 10 MB.");
        }
        if failure.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(failure))
        }
    }
}

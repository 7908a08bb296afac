use jiff::Timestamp;
use jiff::civil::Date;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    models::{InvalidDate, parse_date},
    validation::{ValidationErrors, Validator},
};

#[derive(Serialize, Deserialize, Default, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    pub id: Uuid,
    pub project_id: Uuid,
    /// Day the money was spent (YYYY-MM-DD)
    pub date: String,
    pub amount: f64,
    /// Short label, also used as the expense category
    pub item: String,
    #[serde(default)]
    pub memo: String,
    pub created_at: Timestamp,
}

impl Expense {
    pub fn day(&self) -> Result<Date, InvalidDate> {
        parse_date("date", &self.date)
    }

    /// `YYYY-MM` bucket. Unparseable dates fall back to their raw prefix so the
    /// amount is still accounted for somewhere.
    pub fn month_key(&self) -> String {
        match self.day() {
            Ok(day) => day.strftime("%Y-%m").to_string(),
            Err(_) => self.date.trim().chars().take(7).collect(),
        }
    }

    pub fn is_in_month(&self, year: i16, month: i8) -> bool {
        self.day()
            .map(|d| d.year() == year && d.month() == month)
            .unwrap_or(false)
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut v = Validator::new();

        if self.project_id.is_nil() {
            v.add("projectId", "Project is required");
        }
        v.date("date", "Expense date", &self.date);
        v.greater_than("amount", "Amount", self.amount, 0.0);
        if v.required("item", "Expense item", &self.item) {
            v.max_length("item", "Expense item", &self.item, 100);
        }
        v.max_length("memo", "Memo", &self.memo, 500);

        v.finish()
    }
}

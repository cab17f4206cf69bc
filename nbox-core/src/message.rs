//! Messages passed between components through the core.

use crate::errors::{NboxError, NboxResult};
use crate::timeseries::Time;
use crate::units::{Unit, UnitVal};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kinds of message the core routes
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    /// Request a value from the provider of a datum
    GetData,
    /// Deliver a value to the component accepting a datum
    SetData,
    /// Move a signed carbon mass (PgC) from the atmosphere into the deep ocean
    DumpToDeepOcean,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageKind::GetData => "getData",
            MessageKind::SetData => "setData",
            MessageKind::DumpToDeepOcean => "deepOceanCarbonDump",
        };
        write!(f, "{}", name)
    }
}

/// Payload of a message
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum MessageValue {
    /// Unparsed text, as read from configuration
    Text(String),
    Value(UnitVal),
}

/// A value and an optional date carried between components
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MessageData {
    pub value: MessageValue,
    pub date: Option<Time>,
}

impl MessageData {
    /// An empty request, used for undated `GetData` messages
    pub fn empty() -> Self {
        Self {
            value: MessageValue::Text(String::new()),
            date: None,
        }
    }

    pub fn from_text(text: &str) -> Self {
        Self {
            value: MessageValue::Text(text.to_string()),
            date: None,
        }
    }

    pub fn from_unitval(value: UnitVal) -> Self {
        Self {
            value: MessageValue::Value(value),
            date: None,
        }
    }

    /// A request for the value at `date`
    pub fn at(date: Time) -> Self {
        Self::empty().with_date(date)
    }

    pub fn with_date(mut self, date: Time) -> Self {
        self.date = Some(date);
        self
    }

    /// Interpret the payload in the `expected` unit
    ///
    /// Text is parsed as a number and tagged with `expected`.
    /// Values are converted where a physical conversion exists.
    pub fn get_unitval(&self, expected: Unit) -> NboxResult<UnitVal> {
        match &self.value {
            MessageValue::Text(text) => {
                let value: f64 = text.trim().parse().map_err(|_| {
                    NboxError::Error(format!("Could not convert '{}' to a number", text))
                })?;
                Ok(UnitVal::new(value, expected))
            }
            MessageValue::Value(v) => v.convert_to(expected),
        }
    }

    /// The payload as text
    pub fn as_text(&self) -> String {
        match &self.value {
            MessageValue::Text(text) => text.clone(),
            MessageValue::Value(v) => v.value().to_string(),
        }
    }

    /// Fail with a date requirement violation unless a date is present
    pub fn require_date(&self, variable: &str) -> NboxResult<Time> {
        self.date.ok_or_else(|| NboxError::DateRequirementViolation {
            variable: variable.to_string(),
            requirement: "required",
        })
    }

    /// Fail with a date requirement violation if a date is present
    pub fn forbid_date(&self, variable: &str) -> NboxResult<()> {
        match self.date {
            Some(_) => Err(NboxError::DateRequirementViolation {
                variable: variable.to_string(),
                requirement: "not allowed",
            }),
            None => Ok(()),
        }
    }
}

impl fmt::Display for MessageData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.value, self.date) {
            (MessageValue::Text(t), Some(d)) => write!(f, "{}[{}]", t, d),
            (MessageValue::Text(t), None) => write!(f, "{}", t),
            (MessageValue::Value(v), Some(d)) => write!(f, "{}[{}]", v, d),
            (MessageValue::Value(v), None) => write!(f, "{}", v),
        }
    }
}

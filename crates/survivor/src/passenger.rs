//! Request and response shapes for passenger survival predictions.
//!
//! Field names serialize with their capitalised aliases (`Pclass`, `SibSp`, ...)
//! and accept the snake-case names on input.

use serde::{Deserialize, Serialize};

/// Passenger sex as recorded on the manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
}

/// Port of embarkation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Port {
    Cherbourg,
    Queenstown,
    Southampton,
}

impl Port {
    /// Parse a manifest embarkation code (`C`, `Q`, `S`). Unknown codes yield `None`.
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim() {
            "C" | "c" => Some(Self::Cherbourg),
            "Q" | "q" => Some(Self::Queenstown),
            "S" | "s" => Some(Self::Southampton),
            _ => None,
        }
    }
}

/// A single passenger row submitted for prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassengerRow {
    #[serde(
        rename = "PassengerId",
        alias = "passenger_id",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub passenger_id: Option<i64>,
    #[serde(
        rename = "Name",
        alias = "name",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub name: Option<String>,
    /// Ticket class: 1, 2 or 3.
    #[serde(rename = "Pclass", alias = "pclass")]
    pub pclass: u8,
    #[serde(rename = "Sex", alias = "sex")]
    pub sex: Sex,
    /// Age in years, 0..=150 when present.
    #[serde(rename = "Age", alias = "age", default)]
    pub age: Option<f64>,
    /// Siblings/spouses aboard.
    #[serde(rename = "SibSp", alias = "sibsp")]
    pub sibsp: u32,
    /// Parents/children aboard.
    #[serde(rename = "Parch", alias = "parch")]
    pub parch: u32,
    #[serde(
        rename = "Ticket",
        alias = "ticket",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub ticket: Option<String>,
    #[serde(rename = "Fare", alias = "fare")]
    pub fare: f64,
    #[serde(
        rename = "Cabin",
        alias = "cabin",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub cabin: Option<String>,
    #[serde(
        rename = "Embarked",
        alias = "embarked",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub embarked: Option<String>,
}

impl PassengerRow {
    pub fn port(&self) -> Option<Port> {
        self.embarked.as_deref().and_then(Port::from_code)
    }
}

/// Body of a predict call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRequest {
    pub passengers: Vec<PassengerRow>,
}

/// One survival prediction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// 0 = did not survive, 1 = survived.
    pub prediction: u8,
    /// Score in [0, 1]; 0.0 when the model cannot score.
    pub confidence: f64,
}

/// Body of a successful predict call, one entry per submitted passenger.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub predictions: Vec<Prediction>,
}

#[cfg(test)]
pub(crate) fn passenger(pclass: u8, sex: Sex, age: Option<f64>) -> PassengerRow {
    PassengerRow {
        passenger_id: None,
        name: None,
        pclass,
        sex,
        age,
        sibsp: 0,
        parch: 0,
        ticket: None,
        fare: 7.25,
        cabin: None,
        embarked: None,
    }
}

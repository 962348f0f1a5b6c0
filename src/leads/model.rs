//! Lead data model — the record, its pipeline enums, and query types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default acquisition source for landing-page submissions.
pub const DEFAULT_SOURCE: &str = "Meta Ad";

/// Pipeline stage. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LeadTag {
    #[serde(rename = "New Lead")]
    NewLead,
    #[serde(rename = "Downloaded Guide")]
    DownloadedGuide,
    #[serde(rename = "Booked Demo")]
    BookedDemo,
}

impl LeadTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadTag::NewLead => "New Lead",
            LeadTag::DownloadedGuide => "Downloaded Guide",
            LeadTag::BookedDemo => "Booked Demo",
        }
    }
}

impl fmt::Display for LeadTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeadTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "New Lead" => Ok(LeadTag::NewLead),
            "Downloaded Guide" => Ok(LeadTag::DownloadedGuide),
            "Booked Demo" => Ok(LeadTag::BookedDemo),
            other => Err(format!("unknown lead tag: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BusinessType {
    #[serde(rename = "Real Estate")]
    RealEstate,
    Clinic,
    Education,
    Other,
}

impl BusinessType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BusinessType::RealEstate => "Real Estate",
            BusinessType::Clinic => "Clinic",
            BusinessType::Education => "Education",
            BusinessType::Other => "Other",
        }
    }
}

impl FromStr for BusinessType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Real Estate" => Ok(BusinessType::RealEstate),
            "Clinic" => Ok(BusinessType::Clinic),
            "Education" => Ok(BusinessType::Education),
            "Other" => Ok(BusinessType::Other),
            other => Err(format!("unknown business type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MonthlyBudget {
    #[serde(rename = "< 10k")]
    Under10k,
    #[serde(rename = "10k - 50k")]
    From10kTo50k,
    #[serde(rename = "50k+")]
    Over50k,
}

impl MonthlyBudget {
    pub fn as_str(&self) -> &'static str {
        match self {
            MonthlyBudget::Under10k => "< 10k",
            MonthlyBudget::From10kTo50k => "10k - 50k",
            MonthlyBudget::Over50k => "50k+",
        }
    }
}

impl FromStr for MonthlyBudget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "< 10k" => Ok(MonthlyBudget::Under10k),
            "10k - 50k" => Ok(MonthlyBudget::From10kTo50k),
            "50k+" => Ok(MonthlyBudget::Over50k),
            other => Err(format!("unknown monthly budget: {other}")),
        }
    }
}

/// What the visitor chose on the landing page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadAction {
    /// Asked for the automation guide.
    Download,
    /// Went straight to booking a demo.
    Book,
}

impl LeadAction {
    /// Initial pipeline stage for a submission with this action.
    pub fn initial_tag(action: Option<LeadAction>) -> LeadTag {
        match action {
            Some(LeadAction::Download) => LeadTag::DownloadedGuide,
            Some(LeadAction::Book) => LeadTag::BookedDemo,
            None => LeadTag::NewLead,
        }
    }
}

/// Campaign tracking captured at creation. Never modified afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attribution {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utm_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utm_medium: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utm_campaign: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utm_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utm_term: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fbclid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
}

/// Confirmed demo time slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl BookingWindow {
    /// Build a window, rejecting an end that precedes the start.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Self> {
        (end >= start).then_some(Self { start, end })
    }

    /// Placeholder slot used when a confirmation carries no timing.
    pub fn default_from(now: DateTime<Utc>) -> Self {
        Self {
            start: now,
            end: now + Duration::minutes(30),
        }
    }
}

/// Input for creating a lead.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLead {
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(default)]
    pub business_type: Option<BusinessType>,
    #[serde(default)]
    pub monthly_budget: Option<MonthlyBudget>,
    #[serde(default)]
    pub ready_to_automate: Option<bool>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub action: Option<LeadAction>,
    #[serde(flatten)]
    pub attribution: Attribution,
}

impl NewLead {
    pub fn new(name: impl Into<String>, email: impl Into<String>, phone: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            phone: phone.into(),
            business_type: None,
            monthly_budget: None,
            ready_to_automate: None,
            source: None,
            action: None,
            attribution: Attribution::default(),
        }
    }

    /// Builder: set the landing-page action.
    pub fn with_action(mut self, action: LeadAction) -> Self {
        self.action = Some(action);
        self
    }

    /// Builder: set classification fields.
    pub fn with_classification(
        mut self,
        business_type: BusinessType,
        monthly_budget: MonthlyBudget,
    ) -> Self {
        self.business_type = Some(business_type);
        self.monthly_budget = Some(monthly_budget);
        self
    }
}

/// A captured contact moving through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_type: Option<BusinessType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monthly_budget: Option<MonthlyBudget>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready_to_automate: Option<bool>,
    pub source: String,
    #[serde(flatten)]
    pub attribution: Attribution,
    pub tag: LeadTag,
    pub booked: bool,
    pub reminder_sent: bool,
    pub booking_start_time: Option<DateTime<Utc>>,
    pub booking_end_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lead {
    /// Build a fresh record from a submission.
    ///
    /// `action = book` marks the lead booked immediately, before any
    /// scheduler confirmation exists.
    pub fn from_submission(input: NewLead, now: DateTime<Utc>) -> Self {
        let tag = LeadAction::initial_tag(input.action);
        Self {
            id: Uuid::new_v4(),
            name: input.name,
            email: input.email,
            phone: input.phone,
            business_type: input.business_type,
            monthly_budget: input.monthly_budget,
            ready_to_automate: input.ready_to_automate,
            source: input.source.unwrap_or_else(|| DEFAULT_SOURCE.to_string()),
            attribution: input.attribution,
            tag,
            booked: tag == LeadTag::BookedDemo,
            reminder_sent: false,
            booking_start_time: None,
            booking_end_time: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Confirmed booking window, if both times are known.
    pub fn booking_window(&self) -> Option<BookingWindow> {
        match (self.booking_start_time, self.booking_end_time) {
            (Some(start), Some(end)) => Some(BookingWindow { start, end }),
            _ => None,
        }
    }

    /// Whether the 24h follow-up may be sent at `cutoff` (creation strictly before it).
    pub fn is_reminder_eligible(&self, cutoff: DateTime<Utc>) -> bool {
        self.tag == LeadTag::DownloadedGuide
            && !self.booked
            && !self.reminder_sent
            && self.created_at < cutoff
    }
}

/// Admin list filters. All optional, combined with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadFilter {
    #[serde(default)]
    pub tag: Option<LeadTag>,
    #[serde(default)]
    pub monthly_budget: Option<MonthlyBudget>,
    #[serde(default)]
    pub business_type: Option<BusinessType>,
}

/// Dashboard aggregates, computed on read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadStats {
    pub total_leads: u64,
    pub downloaded_guide: u64,
    pub booked_demo: u64,
    /// Booked / total as a percentage, two decimal places.
    pub conversion_rate: Decimal,
}

impl LeadStats {
    pub fn new(total_leads: u64, downloaded_guide: u64, booked_demo: u64) -> Self {
        let conversion_rate = if total_leads == 0 {
            Decimal::ZERO
        } else {
            (Decimal::from(booked_demo) * Decimal::ONE_HUNDRED / Decimal::from(total_leads))
                .round_dp(2)
        };
        Self {
            total_leads,
            downloaded_guide,
            booked_demo,
            conversion_rate,
        }
    }
}

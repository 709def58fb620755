use crate::date::{self, ToCalendarDay};
use crate::trip::TripRange;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCategory {
    NoTripSet,
    BeforeTrip,
    DuringTrip,
    TripEnded,
}

/// Which illustration a presentation layer should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    PreTrip,
    LongStretch,
    Midway,
    FinalStretch,
    Celebration,
}

impl Tier {
    /// Bundled asset name for this tier.
    pub fn asset_name(self) -> &'static str {
        match self {
            Tier::PreTrip => "pretrip",
            Tier::LongStretch => "tired",
            Tier::Midway => "cope",
            Tier::FinalStretch => "almost",
            Tier::Celebration => "celebration",
        }
    }

    fn for_days_left(days_left: i64) -> Self {
        match days_left {
            4.. => Tier::LongStretch,
            2..=3 => Tier::Midway,
            _ => Tier::FinalStretch,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::PreTrip => write!(f, "pre_trip"),
            Tier::LongStretch => write!(f, "long_stretch"),
            Tier::Midway => write!(f, "midway"),
            Tier::FinalStretch => write!(f, "final_stretch"),
            Tier::Celebration => write!(f, "celebration"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedStatus {
    pub category: StatusCategory,
    pub primary_text: String,
    pub secondary_text: String,
    pub tertiary_text: Option<String>,
    pub visual_key: Tier,
}

fn days(n: i64) -> &'static str {
    if n == 1 { "day" } else { "days" }
}

/// Where `today` falls relative to `range`.
pub fn resolve<T: ToCalendarDay + ?Sized>(today: &T, range: Option<&TripRange>) -> ResolvedStatus {
    let Some(range) = range else {
        return ResolvedStatus {
            category: StatusCategory::NoTripSet,
            primary_text: "No trip set".into(),
            secondary_text: "Set trip dates to start the countdown".into(),
            tertiary_text: None,
            visual_key: Tier::PreTrip,
        };
    };

    let today = date::start_of_day(today);
    let start = range.start();
    let end = range.end();

    let days_until_start = date::diff_days(&start, &today);
    let days_left = date::diff_days(&end, &today);

    // Wording only.
    let is_default_week =
        date::is_monday(&start) && date::is_friday(&end) && date::diff_days(&end, &start) == 4;

    let secondary_text = date::format_range(&start, &end);

    if days_until_start > 0 {
        return ResolvedStatus {
            category: StatusCategory::BeforeTrip,
            primary_text: format!("Trip starts in {days_until_start} {}", days(days_until_start)),
            secondary_text,
            tertiary_text: None,
            visual_key: Tier::PreTrip,
        };
    }

    if days_left >= 0 {
        let until = if is_default_week { "Friday" } else { "trip ends" };
        return ResolvedStatus {
            category: StatusCategory::DuringTrip,
            primary_text: format!("{days_left} {} left until {until}", days(days_left)),
            secondary_text,
            tertiary_text: None,
            visual_key: Tier::for_days_left(days_left),
        };
    }

    ResolvedStatus {
        category: StatusCategory::TripEnded,
        primary_text: "Trip finished \u{1f389}".into(),
        secondary_text,
        tertiary_text: Some(format!("Days since trip ended: {}", days_left.abs())),
        visual_key: Tier::Celebration,
    }
}

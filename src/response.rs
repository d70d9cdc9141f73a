//! Outward-facing recommendation payload

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{FoodCategory, TimeOfDayBucket, Venue, WeatherCondition, WeatherSnapshot};
use crate::search::{Exhaustion, RecommendationResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryView {
    pub id: String,
    pub label: String,
}

impl From<&FoodCategory> for CategoryView {
    fn from(category: &FoodCategory) -> Self {
        Self {
            id: category.id.clone(),
            label: category.label.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherView {
    pub condition: WeatherCondition,
    pub temperature_c: f64,
    pub humidity: Option<f64>,
}

/// How the search went, from the user's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Notice {
    Nearby,
    FurtherAway,
    LocalFavourites,
    NothingNearby,
    SearchUnavailable,
}

impl Notice {
    #[must_use]
    pub fn for_result(result: &RecommendationResult) -> Self {
        match result.exhaustion {
            Some(Exhaustion::ProviderErrors) => Self::SearchUnavailable,
            Some(Exhaustion::EmptyResults) => Self::NothingNearby,
            None if result.filter_relaxed => Self::LocalFavourites,
            None if result.tier > 0 => Self::FurtherAway,
            None => Self::Nearby,
        }
    }

    #[must_use]
    pub fn text(&self, radius_m: u32) -> String {
        match self {
            Self::Nearby => format!("Found spots within {radius_m} m of you."),
            Self::FurtherAway => {
                format!("Nothing right next to you, but these are a bit further away (within {radius_m} m).")
            }
            Self::LocalFavourites => {
                "Today's pick isn't served nearby, so here are some local favourites instead."
                    .to_string()
            }
            Self::NothingNearby => {
                format!("No restaurants found within {radius_m} m. One of the alternates might work.")
            }
            Self::SearchUnavailable => {
                "Restaurant search is unavailable right now. Please try again shortly.".to_string()
            }
        }
    }
}

/// JSON body of a successful recommendation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub request_id: Uuid,
    pub category: CategoryView,
    pub message: Option<String>,
    /// Term the venue search used; absent once the filter was dropped
    pub keyword: Option<String>,
    pub tier: usize,
    pub search_radius_m: u32,
    pub filter_relaxed: bool,
    pub exhausted: bool,
    pub exhaustion: Option<Exhaustion>,
    pub notice: Notice,
    pub notice_text: String,
    pub weather: WeatherView,
    pub time_of_day: TimeOfDayBucket,
    pub venues: Vec<Venue>,
    pub alternates: Vec<CategoryView>,
}

/// Turns a search result into the response payload
pub struct ResponseAssembler;

impl ResponseAssembler {
    #[must_use]
    pub fn assemble(
        request_id: Uuid,
        weather: &WeatherSnapshot,
        bucket: TimeOfDayBucket,
        result: &RecommendationResult,
    ) -> RecommendationResponse {
        let notice = Notice::for_result(result);
        let keyword = (!result.filter_relaxed)
            .then(|| result.category.search_keyword().to_string());

        RecommendationResponse {
            request_id,
            category: CategoryView::from(&result.category),
            message: result.category.message.clone(),
            keyword,
            tier: result.tier,
            search_radius_m: result.radius_m,
            filter_relaxed: result.filter_relaxed,
            exhausted: result.is_exhausted(),
            exhaustion: result.exhaustion,
            notice,
            notice_text: notice.text(result.radius_m),
            weather: WeatherView {
                condition: weather.condition,
                temperature_c: weather.temperature_c,
                humidity: weather.humidity,
            },
            time_of_day: bucket,
            venues: result.venues.clone(),
            alternates: result.alternates.iter().map(CategoryView::from).collect(),
        }
    }
}

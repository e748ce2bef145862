//! The weighted-sum match rubric and the static sample catalogue it
//! runs against.
//!
//! Points: budget fit 40 (20 when the price is under budget), location
//! 20, property type 20, risk alignment 10, expected return 10 (5 at
//! the lower threshold). Scores always land in [0, 100].

use chrono::Utc;
use sqlx::{types::Json as Db, SqlitePool};
use uuid::Uuid;

use crate::{
    models::{InvestorProfile, PropertyDetails, PropertyType, Recommendation, RiskLevel},
    AppResult,
};

pub(crate) const MIN_MATCH_SCORE: i64 = 30;
pub(crate) const MAX_RESULTS: usize = 5;

pub(crate) struct SampleProperty {
    pub title: &'static str,
    pub description: &'static str,
    pub location: &'static str,
    pub property_type: PropertyType,
    pub price: f64,
    pub expected_return: f64,
    pub risk_level: RiskLevel,
    pub image_url: &'static str,
    pub details: PropertyDetails,
}

pub(crate) fn sample_properties() -> Vec<SampleProperty> {
    vec![
        SampleProperty {
            title: "Modern Apartment in Ramallah",
            description: "Luxury 3-bedroom apartment in the heart of Ramallah with stunning views",
            location: "Ramallah",
            property_type: PropertyType::Residential,
            price: 150_000.0,
            expected_return: 8.5,
            risk_level: RiskLevel::Low,
            image_url: "https://example.com/property1.jpg",
            details: PropertyDetails {
                size: Some(120.0),
                bedrooms: Some(3),
                bathrooms: Some(2),
                year_built: Some(2020),
                features: Some(strings(&["Parking", "Balcony", "Central Heating"])),
            },
        },
        SampleProperty {
            title: "Commercial Space in Jerusalem",
            description: "Prime commercial space in central Jerusalem, ideal for retail",
            location: "Jerusalem",
            property_type: PropertyType::Commercial,
            price: 300_000.0,
            expected_return: 12.0,
            risk_level: RiskLevel::Medium,
            image_url: "https://example.com/property2.jpg",
            details: PropertyDetails {
                size: Some(200.0),
                year_built: Some(2018),
                features: Some(strings(&["High Traffic Area", "Parking", "Modern Facilities"])),
                ..Default::default()
            },
        },
        SampleProperty {
            title: "Agricultural Land in Hebron",
            description: "Fertile agricultural land with water access",
            location: "Hebron",
            property_type: PropertyType::Agricultural,
            price: 80_000.0,
            expected_return: 6.5,
            risk_level: RiskLevel::Low,
            image_url: "https://example.com/property3.jpg",
            details: PropertyDetails {
                size: Some(5000.0),
                year_built: Some(2000),
                features: Some(strings(&["Water Access", "Fertile Soil", "Road Access"])),
                ..Default::default()
            },
        },
        SampleProperty {
            title: "Villa in Bethlehem",
            description: "Spacious villa with garden in quiet neighborhood",
            location: "Bethlehem",
            property_type: PropertyType::Residential,
            price: 250_000.0,
            expected_return: 7.0,
            risk_level: RiskLevel::Medium,
            image_url: "https://example.com/property4.jpg",
            details: PropertyDetails {
                size: Some(250.0),
                bedrooms: Some(5),
                bathrooms: Some(3),
                year_built: Some(2019),
                features: Some(strings(&["Garden", "Garage", "Security System"])),
            },
        },
        SampleProperty {
            title: "Industrial Warehouse in Nablus",
            description: "Large industrial warehouse with loading docks",
            location: "Nablus",
            property_type: PropertyType::Industrial,
            price: 400_000.0,
            expected_return: 10.0,
            risk_level: RiskLevel::High,
            image_url: "https://example.com/property5.jpg",
            details: PropertyDetails {
                size: Some(1000.0),
                year_built: Some(2015),
                features: Some(strings(&["Loading Docks", "High Ceiling", "Security"])),
                ..Default::default()
            },
        },
    ]
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_owned()).collect()
}

pub(crate) fn match_score(property: &SampleProperty, profile: &InvestorProfile) -> i64 {
    let budget = &profile.budget_range.0;
    let mut score = 0;

    if property.price >= budget.min && property.price <= budget.max {
        score += 40;
    } else if property.price < budget.min {
        score += 20;
    }

    if profile
        .preferred_locations
        .0
        .iter()
        .any(|l| l == property.location)
    {
        score += 20;
    }

    if profile.property_types.0.contains(&property.property_type) {
        score += 20;
    }

    if property.risk_level == profile.risk_tolerance {
        score += 10;
    }

    if property.expected_return >= 8.0 {
        score += 10;
    } else if property.expected_return >= 6.0 {
        score += 5;
    }

    score
}

pub(crate) fn reasons(property: &SampleProperty, profile: &InvestorProfile) -> Vec<String> {
    let budget = &profile.budget_range.0;
    let mut reasons = Vec::new();

    if property.price >= budget.min && property.price <= budget.max {
        reasons.push("Fits within your budget range".to_owned());
    }
    if profile
        .preferred_locations
        .0
        .iter()
        .any(|l| l == property.location)
    {
        reasons.push("Located in your preferred area".to_owned());
    }
    if profile.property_types.0.contains(&property.property_type) {
        reasons.push("Matches your preferred property type".to_owned());
    }
    if property.risk_level == profile.risk_tolerance {
        reasons.push("Aligns with your risk tolerance".to_owned());
    }
    if property.expected_return >= 8.0 {
        reasons.push("High expected return on investment".to_owned());
    }
    if property.risk_level == RiskLevel::Low {
        reasons.push("Low risk investment".to_owned());
    }

    if reasons.is_empty() {
        reasons.push("Good investment opportunity".to_owned());
    }
    reasons
}

/// Scores the catalogue against a profile and upserts the qualifying
/// results. An existing user+title row wins over a fresh insert, so
/// regeneration never duplicates.
pub(crate) async fn generate(
    db_pool: &SqlitePool,
    profile: &InvestorProfile,
) -> AppResult<Vec<Recommendation>> {
    let mut scored: Vec<(SampleProperty, i64)> = sample_properties()
        .into_iter()
        .map(|p| {
            let score = match_score(&p, profile);
            (p, score)
        })
        .collect();
    scored.sort_by(|a, b| b.1.cmp(&a.1));

    let mut out = Vec::new();
    for (property, score) in scored
        .into_iter()
        .take(MAX_RESULTS)
        .filter(|(_, s)| *s >= MIN_MATCH_SCORE)
    {
        let existing = sqlx::query_as::<_, Recommendation>(
            "SELECT * FROM recommendations WHERE user_id = ? AND property_title = ?",
        )
        .bind(&profile.user_id)
        .bind(property.title)
        .fetch_optional(db_pool)
        .await?;

        if let Some(existing) = existing {
            out.push(existing);
            continue;
        }

        let id = Uuid::now_v7().to_string();
        let now = Utc::now();
        let reason_list = reasons(&property, profile);

        sqlx::query(
            "INSERT INTO recommendations
             (id, user_id, property_title, property_description, location, property_type,
              price, expected_return, risk_level, match_score, reasons, image_url,
              property_details, status, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'active', ?, ?)",
        )
        .bind(&id)
        .bind(&profile.user_id)
        .bind(property.title)
        .bind(property.description)
        .bind(property.location)
        .bind(property.property_type)
        .bind(property.price)
        .bind(property.expected_return)
        .bind(property.risk_level)
        .bind(score)
        .bind(Db(reason_list))
        .bind(property.image_url)
        .bind(Db(property.details))
        .bind(now)
        .bind(now)
        .execute(db_pool)
        .await?;

        out.push(
            sqlx::query_as::<_, Recommendation>("SELECT * FROM recommendations WHERE id = ?")
                .bind(&id)
                .fetch_one(db_pool)
                .await?,
        );
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BudgetRange, InvestmentHorizon, ReturnType};
    use chrono::Utc;

    fn profile(
        budget: (f64, f64),
        locations: &[&str],
        types: &[PropertyType],
        risk: RiskLevel,
    ) -> InvestorProfile {
        let now = Utc::now();
        InvestorProfile {
            user_id: "u1".to_owned(),
            investment_goals: Db(vec![]),
            budget_range: Db(BudgetRange {
                min: budget.0,
                max: budget.1,
            }),
            preferred_locations: Db(strings(locations)),
            property_types: Db(types.to_vec()),
            investment_horizon: InvestmentHorizon::Medium,
            risk_tolerance: risk,
            preferred_return_type: ReturnType::Both,
            additional_notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn property(title: &str) -> SampleProperty {
        sample_properties()
            .into_iter()
            .find(|p| p.title == title)
            .unwrap()
    }

    #[test]
    fn full_match_on_every_criterion() {
        let profile = profile(
            (100_000.0, 200_000.0),
            &["Ramallah"],
            &[PropertyType::Residential],
            RiskLevel::Low,
        );
        let apartment = property("Modern Apartment in Ramallah");
        // 40 budget + 20 location + 20 type + 10 risk + 10 return
        assert_eq!(match_score(&apartment, &profile), 100);
    }

    #[test]
    fn rubric_awards_partial_budget_points_below_range() {
        let profile = profile((200_000.0, 300_000.0), &[], &[], RiskLevel::High);
        let apartment = property("Modern Apartment in Ramallah");
        // 20 under-budget + 10 return
        assert_eq!(match_score(&apartment, &profile), 30);
    }

    #[test]
    fn over_budget_property_gets_no_budget_points() {
        let profile = profile(
            (100_000.0, 200_000.0),
            &[],
            &[PropertyType::Industrial],
            RiskLevel::High,
        );
        let warehouse = property("Industrial Warehouse in Nablus");
        // 0 budget + 20 type + 10 risk + 10 return
        assert_eq!(match_score(&warehouse, &profile), 40);
    }

    #[test]
    fn mid_tier_return_awards_five_points() {
        let profile = profile((0.0, 0.0), &[], &[], RiskLevel::High);
        let land = property("Agricultural Land in Hebron");
        // nothing matches except the 6.5% return tier
        assert_eq!(match_score(&land, &profile), 5);
    }

    #[test]
    fn score_never_exceeds_one_hundred() {
        let profile = profile(
            (0.0, 1_000_000.0),
            &["Ramallah", "Jerusalem", "Hebron", "Bethlehem", "Nablus"],
            &[
                PropertyType::Residential,
                PropertyType::Commercial,
                PropertyType::Industrial,
                PropertyType::Agricultural,
            ],
            RiskLevel::Low,
        );
        for p in sample_properties() {
            let s = match_score(&p, &profile);
            assert!((0..=100).contains(&s), "{}: {s}", p.title);
        }
    }

    #[test]
    fn reasons_follow_the_matched_criteria() {
        let profile = profile(
            (100_000.0, 200_000.0),
            &["Ramallah"],
            &[PropertyType::Residential],
            RiskLevel::Low,
        );
        let apartment = property("Modern Apartment in Ramallah");
        let reasons = reasons(&apartment, &profile);
        assert!(reasons.contains(&"Fits within your budget range".to_owned()));
        assert!(reasons.contains(&"Located in your preferred area".to_owned()));
        assert!(reasons.contains(&"Low risk investment".to_owned()));
    }

    #[test]
    fn reasons_fall_back_when_nothing_matches() {
        let profile = profile((1_000_000.0, 2_000_000.0), &[], &[], RiskLevel::Low);
        let villa = property("Villa in Bethlehem");
        assert_eq!(
            reasons(&villa, &profile),
            vec!["Good investment opportunity".to_owned()]
        );
    }
}

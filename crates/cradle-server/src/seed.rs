//! Demo data for a fresh database.

use anyhow::{Context, anyhow};
use cradle_db::Database;
use cradle_types::api::{ListingRequest, UpdateProfileRequest};
use cradle_types::validation::{validate_listing, validate_profile};
use tracing::info;
use uuid::Uuid;

/// Password shared by every demo account.
pub const DEMO_PASSWORD: &str = "cradle-demo";

struct DemoUser {
    email: &'static str,
    name: &'static str,
    location: &'static str,
    phone: Option<&'static str>,
}

const USERS: &[DemoUser] = &[
    DemoUser { email: "alice@example.com", name: "Alice Johnson", location: "Geneva", phone: Some("+41 79 123 45 67") },
    DemoUser { email: "bob@example.com", name: "Bob Smith", location: "Lausanne", phone: Some("+41 78 987 65 43") },
    DemoUser { email: "carol@example.com", name: "Carol Davis", location: "Nyon", phone: None },
];

struct DemoListing {
    owner: usize,
    title: &'static str,
    description: &'static str,
    price: &'static str,
    category: &'static str,
    condition: &'static str,
    location: &'static str,
    age_range: Option<&'static str>,
    brand: Option<&'static str>,
    size: Option<&'static str>,
    image: &'static str,
}

const LISTINGS: &[DemoListing] = &[
    DemoListing {
        owner: 0,
        title: "Premium Baby Stroller - Lightweight & Foldable",
        description: "Lightweight jogging stroller in excellent condition. Includes rain cover and storage basket. Used for only 6 months.",
        price: "120.00",
        category: "strollers",
        condition: "like-new",
        location: "Geneva",
        age_range: Some("0-6 months"),
        brand: Some("Bugaboo"),
        size: None,
        image: "https://images.unsplash.com/photo-1544534769-d83bb7a5d48c?w=400&h=400&fit=crop",
    },
    DemoListing {
        owner: 0,
        title: "Solid Wood Baby Crib - Convertible",
        description: "Beautiful solid oak crib, barely used. Converts to toddler bed. Includes organic mattress and fitted sheets.",
        price: "280.00",
        category: "beds",
        condition: "like-new",
        location: "Geneva",
        age_range: None,
        brand: Some("IKEA"),
        size: None,
        image: "https://images.unsplash.com/photo-1522771930-78848d9293e8?w=400&h=400&fit=crop",
    },
    DemoListing {
        owner: 1,
        title: "Adjustable High Chair - Modern Design",
        description: "Modern high chair with 7 height positions and removable tray. Easy to clean and fold for storage.",
        price: "85.00",
        category: "furniture",
        condition: "good",
        location: "Lausanne",
        age_range: Some("6-12 months"),
        brand: Some("Stokke"),
        size: None,
        image: "https://images.unsplash.com/photo-1598300042247-d088f8ab3a91?w=400&h=400&fit=crop",
    },
    DemoListing {
        owner: 1,
        title: "Video Baby Monitor with Night Vision",
        description: "HD video baby monitor with night vision and two-way audio. Includes wall mount and portable parent unit.",
        price: "65.00",
        category: "monitors",
        condition: "good",
        location: "Lausanne",
        age_range: None,
        brand: Some("Motorola"),
        size: None,
        image: "https://images.unsplash.com/photo-1551836022-8b2858c9c69b?w=400&h=400&fit=crop",
    },
    DemoListing {
        owner: 2,
        title: "Organic Cotton Onesies Set (6 pieces)",
        description: "Set of 6 organic cotton onesies, GOTS certified. Washed but barely worn, perfect condition.",
        price: "28.00",
        category: "clothing",
        condition: "new",
        location: "Nyon",
        age_range: Some("0-6 months"),
        brand: None,
        size: Some("0-3 months"),
        image: "https://images.unsplash.com/photo-1519689373023-dd07c7988603?w=400&h=400&fit=crop",
    },
    DemoListing {
        owner: 2,
        title: "Electric Breast Pump - Hospital Grade",
        description: "Electric double breast pump with carrying case, bottles and multiple flange sizes. Sterilized and ready to use.",
        price: "165.00",
        category: "feeding",
        condition: "like-new",
        location: "Nyon",
        age_range: None,
        brand: Some("Medela"),
        size: None,
        image: "https://images.unsplash.com/photo-1515488042361-ee00e0ddd4e4?w=400&h=400&fit=crop",
    },
];

/// Seed demo users and listings. Does nothing unless the users table is
/// empty. Returns whether anything was inserted.
pub fn seed_demo(db: &Database) -> anyhow::Result<bool> {
    if db.count_users()? > 0 {
        info!("Database already has users, skipping demo seed");
        return Ok(false);
    }

    let password_hash = cradle_api::auth::hash_password(DEMO_PASSWORD)?;
    let mut user_ids: Vec<Uuid> = Vec::with_capacity(USERS.len());

    for demo in USERS {
        let user = db.create_user(demo.email, Some(demo.name), &password_hash)?;
        let profile = validate_profile(&UpdateProfileRequest {
            location: Some(demo.location.to_string()),
            phone: demo.phone.map(str::to_string),
            ..Default::default()
        })
        .map_err(|errors| anyhow!("invalid demo profile for {}: {:?}", demo.email, errors))?;
        db.update_profile(user.id, &profile)?;
        info!("Seeded user {}", demo.email);
        user_ids.push(user.id);
    }

    for demo in LISTINGS {
        let owner = *user_ids
            .get(demo.owner)
            .with_context(|| format!("demo listing '{}' has no owner", demo.title))?;
        let request = ListingRequest {
            title: Some(demo.title.to_string()),
            description: Some(demo.description.to_string()),
            price: Some(serde_json::Value::String(demo.price.to_string())),
            category: Some(demo.category.to_string()),
            condition: Some(demo.condition.to_string()),
            location: Some(demo.location.to_string()),
            age_range: demo.age_range.map(str::to_string),
            brand: demo.brand.map(str::to_string),
            size: demo.size.map(str::to_string),
            images: Some(vec![demo.image.to_string()]),
            ..Default::default()
        };
        let valid = validate_listing(&request)
            .map_err(|errors| anyhow!("invalid demo listing '{}': {:?}", demo.title, errors))?;
        let listing = db.create_listing(owner, &valid)?;
        info!("Seeded listing {} ({})", listing.title, listing.price);
    }

    Ok(true)
}

#[cfg(test)]
mod tests {
    use cradle_types::validation::ListingFilters;

    use super::*;

    #[test]
    fn seeds_once_and_all_demo_data_validates() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(&dir.path().join("seed.db")).unwrap();

        assert!(seed_demo(&db).unwrap());
        assert_eq!(db.count_users().unwrap(), USERS.len() as u64);
        let listings = db.search_listings(&ListingFilters::default()).unwrap();
        assert_eq!(listings.len(), LISTINGS.len());

        let alice = db.get_user_by_email("alice@example.com").unwrap().unwrap();
        assert_eq!(alice.phone.as_deref(), Some("+41 79 123 45 67"));

        assert!(!seed_demo(&db).unwrap());
        assert_eq!(db.count_users().unwrap(), USERS.len() as u64);
    }
}

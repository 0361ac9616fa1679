//! Listing storage and the browse/search query composer.

use cradle_types::ListingStatus;
use cradle_types::validation::{ListingFilters, ValidListing};
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use tracing::info;
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::models::{Listing, ListingCounts, ListingWithOwner};
use crate::users::user_ref_at;
use crate::{Database, format_ts, now, opt_parsed_at, parsed_at, ts_at, uuid_at};

/// Browse results are capped at this many listings.
pub const PAGE_SIZE: u32 = 50;

const LISTING_COLUMNS: &str = "l.id, l.user_id, l.title, l.description, l.price_cents, l.category, \
     l.condition, l.location, l.age_range, l.brand, l.size, l.images, l.status, l.views, \
     l.admin_number, l.admin_place, l.created_at, l.updated_at";

/// Number of columns in `LISTING_COLUMNS`; owner columns follow.
const OWNER_OFFSET: usize = 18;

const OWNER_COLUMNS: &str = "u.id, u.name, u.email, u.image, u.location";

/// Composes the single SELECT behind `GET /listings`.
///
/// Free text matches title OR description (plus the admin fields the caller
/// asked for), case-insensitively. Every other filter is ANDed. Only active
/// listings are returned, newest first.
#[derive(Debug, Clone)]
pub struct ListingQuery<'a> {
    filters: &'a ListingFilters,
}

impl<'a> ListingQuery<'a> {
    pub fn new(filters: &'a ListingFilters) -> Self {
        Self { filters }
    }

    /// SQL text plus positional parameters (`?1`, `?2`, ...).
    pub fn to_sql(&self) -> (String, Vec<Value>) {
        let f = self.filters;
        let mut values: Vec<Value> = Vec::new();
        let mut clauses: Vec<String> = Vec::new();

        values.push(Value::Text(ListingStatus::Active.as_str().to_string()));
        clauses.push(format!("l.status = ?{}", values.len()));

        if let Some(search) = &f.search {
            values.push(Value::Text(like_pattern(search)));
            let idx = values.len();
            let mut any = vec![fold_like("l.title", idx), fold_like("l.description", idx)];
            if f.admin_number.is_some() {
                any.push(fold_like("l.admin_number", idx));
            }
            if f.admin_place.is_some() {
                any.push(fold_like("l.admin_place", idx));
            }
            clauses.push(format!("({})", any.join(" OR ")));
        }

        if let Some(number) = &f.admin_number {
            values.push(Value::Text(like_pattern(number)));
            clauses.push(fold_like("l.admin_number", values.len()));
        }
        if let Some(place) = &f.admin_place {
            values.push(Value::Text(like_pattern(place)));
            clauses.push(fold_like("l.admin_place", values.len()));
        }
        if let Some(category) = f.category {
            values.push(Value::Text(category.as_str().to_string()));
            clauses.push(format!("l.category = ?{}", values.len()));
        }
        if let Some(condition) = f.condition {
            values.push(Value::Text(condition.as_str().to_string()));
            clauses.push(format!("l.condition = ?{}", values.len()));
        }
        if let Some(location) = f.location {
            values.push(Value::Text(location.as_str().to_string()));
            clauses.push(format!("l.location = ?{}", values.len()));
        }
        if let Some(min) = f.min_price {
            values.push(Value::Integer(min.cents()));
            clauses.push(format!("l.price_cents >= ?{}", values.len()));
        }
        if let Some(max) = f.max_price {
            values.push(Value::Integer(max.cents()));
            clauses.push(format!("l.price_cents <= ?{}", values.len()));
        }

        values.push(Value::Integer(i64::from(PAGE_SIZE)));
        let sql = format!(
            "SELECT {}, {} FROM listings l JOIN users u ON u.id = l.user_id \
             WHERE {} ORDER BY l.created_at DESC, l.id DESC LIMIT ?{}",
            LISTING_COLUMNS,
            OWNER_COLUMNS,
            clauses.join(" AND "),
            values.len()
        );
        (sql, values)
    }

    pub fn run(&self, conn: &Connection) -> Result<Vec<ListingWithOwner>> {
        let (sql, values) = self.to_sql();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values), row_to_listing_with_owner)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

/// Substring match on both sides folded through `fold()`, since SQLite's own
/// LIKE only ignores ASCII case.
fn fold_like(column: &str, idx: usize) -> String {
    format!("fold({}) LIKE fold(?{}) ESCAPE '\\'", column, idx)
}

/// `%term%` with LIKE wildcards in the term escaped.
fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

impl Database {
    pub fn search_listings(&self, filters: &ListingFilters) -> Result<Vec<ListingWithOwner>> {
        self.with_conn(|conn| ListingQuery::new(filters).run(conn))
    }

    /// Insert a new active listing owned by `owner_id`.
    pub fn create_listing(&self, owner_id: Uuid, input: &ValidListing) -> Result<Listing> {
        let created_at = now();
        let listing = Listing {
            id: Uuid::new_v4(),
            user_id: owner_id,
            title: input.title.clone(),
            description: input.description.clone(),
            price: input.price,
            category: input.category,
            condition: input.condition,
            location: input.location,
            age_range: input.age_range,
            brand: input.brand.clone(),
            size: input.size.clone(),
            images: input.images.clone(),
            status: ListingStatus::Active,
            views: 0,
            admin_number: input.admin_number.clone(),
            admin_place: input.admin_place.clone(),
            created_at,
            updated_at: created_at,
        };
        let images = encode_images(&listing.images)?;

        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO listings (id, user_id, title, description, price_cents, category, condition,
                    location, age_range, brand, size, images, status, views, admin_number, admin_place,
                    created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, 0, ?14, ?15, ?16, ?16)",
                params![
                    listing.id.to_string(),
                    owner_id.to_string(),
                    listing.title,
                    listing.description,
                    listing.price.cents(),
                    listing.category.as_str(),
                    listing.condition.as_str(),
                    listing.location.as_str(),
                    listing.age_range.map(|a| a.as_str()),
                    listing.brand,
                    listing.size,
                    images,
                    listing.status.as_str(),
                    listing.admin_number,
                    listing.admin_place,
                    format_ts(&created_at),
                ],
            )?;
            Ok(())
        })?;

        info!("Listing {} created by {} at {} CHF", listing.id, owner_id, listing.price);
        Ok(listing)
    }

    /// Fetch a listing for display, counting the view unless the viewer owns it.
    pub fn view_listing(&self, id: Uuid, viewer: Option<Uuid>) -> Result<ListingWithOwner> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let mut found = query_listing_with_owner(&tx, id)?.ok_or(StoreError::NotFound)?;
            if viewer != Some(found.listing.user_id) {
                tx.execute(
                    "UPDATE listings SET views = views + 1 WHERE id = ?1",
                    [id.to_string()],
                )?;
                found.listing.views += 1;
            }
            tx.commit()?;
            Ok(found)
        })
    }

    /// Replace the editable fields of a listing owned by `actor_id`.
    ///
    /// Admin-only columns are written only when `write_admin_fields` is set;
    /// otherwise their stored values are kept.
    pub fn update_listing(
        &self,
        id: Uuid,
        actor_id: Uuid,
        input: &ValidListing,
        write_admin_fields: bool,
    ) -> Result<Listing> {
        let images = encode_images(&input.images)?;
        let updated_at = now();

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let existing = query_listing(&tx, id)?.ok_or(StoreError::NotFound)?;
            if existing.user_id != actor_id {
                return Err(StoreError::Forbidden);
            }

            let status = input.status.unwrap_or(existing.status);
            let (admin_number, admin_place) = if write_admin_fields {
                (input.admin_number.clone(), input.admin_place.clone())
            } else {
                (existing.admin_number.clone(), existing.admin_place.clone())
            };

            tx.execute(
                "UPDATE listings SET title = ?1, description = ?2, price_cents = ?3, category = ?4,
                    condition = ?5, location = ?6, age_range = ?7, brand = ?8, size = ?9, images = ?10,
                    status = ?11, admin_number = ?12, admin_place = ?13, updated_at = ?14
                 WHERE id = ?15",
                params![
                    input.title,
                    input.description,
                    input.price.cents(),
                    input.category.as_str(),
                    input.condition.as_str(),
                    input.location.as_str(),
                    input.age_range.map(|a| a.as_str()),
                    input.brand,
                    input.size,
                    images,
                    status.as_str(),
                    admin_number,
                    admin_place,
                    format_ts(&updated_at),
                    id.to_string(),
                ],
            )?;

            let updated = query_listing(&tx, id)?.ok_or(StoreError::NotFound)?;
            tx.commit()?;
            Ok(updated)
        })
    }

    /// Soft delete: the row stays (conversations reference it) but the
    /// listing disappears from every read path.
    pub fn delete_listing(&self, id: Uuid, actor_id: Uuid) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let existing = query_listing(&tx, id)?.ok_or(StoreError::NotFound)?;
            if existing.user_id != actor_id {
                return Err(StoreError::Forbidden);
            }
            tx.execute(
                "UPDATE listings SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![
                    ListingStatus::Deleted.as_str(),
                    format_ts(&now()),
                    id.to_string()
                ],
            )?;
            tx.commit()?;
            Ok(())
        })?;
        info!("Listing {} deleted by {}", id, actor_id);
        Ok(())
    }

    /// The owner's non-deleted listings, newest first.
    pub fn listings_for_user(&self, user_id: Uuid) -> Result<Vec<Listing>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM listings l WHERE l.user_id = ?1 AND l.status != ?2
                 ORDER BY l.created_at DESC, l.id DESC",
                LISTING_COLUMNS
            ))?;
            let rows = stmt
                .query_map(
                    params![user_id.to_string(), ListingStatus::Deleted.as_str()],
                    row_to_listing,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn listing_counts(&self, user_id: Uuid) -> Result<ListingCounts> {
        self.with_conn(|conn| {
            let (total, active): (i64, i64) = conn.query_row(
                "SELECT COUNT(*), COALESCE(SUM(status = 'active'), 0)
                 FROM listings WHERE user_id = ?1 AND status != 'deleted'",
                [user_id.to_string()],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )?;
            Ok(ListingCounts {
                total: total as u32,
                active: active as u32,
            })
        })
    }
}

fn encode_images(images: &[String]) -> Result<String> {
    serde_json::to_string(images).map_err(|e| StoreError::Corrupt(e.to_string()))
}

pub(crate) fn decode_images(row: &Row<'_>, idx: usize) -> rusqlite::Result<Vec<String>> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

pub(crate) fn price_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<cradle_types::Price> {
    let cents: i64 = row.get(idx)?;
    cradle_types::Price::from_cents(cents).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Integer, Box::new(e))
    })
}

fn query_listing(conn: &Connection, id: Uuid) -> Result<Option<Listing>> {
    let listing = conn
        .query_row(
            &format!(
                "SELECT {} FROM listings l WHERE l.id = ?1 AND l.status != ?2",
                LISTING_COLUMNS
            ),
            params![id.to_string(), ListingStatus::Deleted.as_str()],
            row_to_listing,
        )
        .optional()?;
    Ok(listing)
}

fn query_listing_with_owner(conn: &Connection, id: Uuid) -> Result<Option<ListingWithOwner>> {
    let listing = conn
        .query_row(
            &format!(
                "SELECT {}, {} FROM listings l JOIN users u ON u.id = l.user_id
                 WHERE l.id = ?1 AND l.status != ?2",
                LISTING_COLUMNS, OWNER_COLUMNS
            ),
            params![id.to_string(), ListingStatus::Deleted.as_str()],
            row_to_listing_with_owner,
        )
        .optional()?;
    Ok(listing)
}

/// Owner (listings.user_id) of a non-deleted listing.
pub(crate) fn listing_owner(conn: &Connection, id: Uuid) -> Result<Option<Uuid>> {
    let owner = conn
        .query_row(
            "SELECT user_id FROM listings WHERE id = ?1 AND status != ?2",
            params![id.to_string(), ListingStatus::Deleted.as_str()],
            |row| uuid_at(row, 0),
        )
        .optional()?;
    Ok(owner)
}

fn row_to_listing(row: &Row<'_>) -> rusqlite::Result<Listing> {
    Ok(Listing {
        id: uuid_at(row, 0)?,
        user_id: uuid_at(row, 1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        price: price_at(row, 4)?,
        category: parsed_at(row, 5)?,
        condition: parsed_at(row, 6)?,
        location: parsed_at(row, 7)?,
        age_range: opt_parsed_at(row, 8)?,
        brand: row.get(9)?,
        size: row.get(10)?,
        images: decode_images(row, 11)?,
        status: parsed_at(row, 12)?,
        views: row.get(13)?,
        admin_number: row.get(14)?,
        admin_place: row.get(15)?,
        created_at: ts_at(row, 16)?,
        updated_at: ts_at(row, 17)?,
    })
}

fn row_to_listing_with_owner(row: &Row<'_>) -> rusqlite::Result<ListingWithOwner> {
    Ok(ListingWithOwner {
        listing: row_to_listing(row)?,
        owner: user_ref_at(row, OWNER_OFFSET)?,
    })
}

#[cfg(test)]
mod tests {
    use cradle_types::{Category, Condition, Location, Price};

    use super::*;
    use crate::testing::{listing, open_temp, user};

    fn price(francs: i64) -> Option<Price> {
        Some(Price::from_francs(francs).unwrap())
    }

    #[test]
    fn composer_without_filters_only_restricts_status() {
        let filters = ListingFilters::default();
        let (sql, values) = ListingQuery::new(&filters).to_sql();
        assert!(sql.contains("WHERE l.status = ?1 ORDER BY l.created_at DESC"));
        assert!(sql.ends_with("LIMIT ?2"));
        assert_eq!(values, vec![Value::Text("active".into()), Value::Integer(50)]);
    }

    #[test]
    fn composer_ors_text_and_ands_the_rest() {
        let filters = ListingFilters {
            search: Some("stroller".into()),
            category: Some(Category::Strollers),
            min_price: price(50),
            max_price: price(100),
            ..Default::default()
        };
        let (sql, values) = ListingQuery::new(&filters).to_sql();
        assert!(sql.contains(
            "(fold(l.title) LIKE fold(?2) ESCAPE '\\' OR fold(l.description) LIKE fold(?2) ESCAPE '\\') \
             AND l.category = ?3"
        ));
        assert!(sql.contains("l.price_cents >= ?4 AND l.price_cents <= ?5"));
        assert_eq!(values[1], Value::Text("%stroller%".into()));
        assert_eq!(values[3], Value::Integer(5_000));
        assert_eq!(values[4], Value::Integer(10_000));
    }

    #[test]
    fn composer_widens_search_to_requested_admin_fields() {
        let filters = ListingFilters {
            search: Some("A-12".into()),
            admin_place: Some("shelf".into()),
            ..Default::default()
        };
        let (sql, _) = ListingQuery::new(&filters).to_sql();
        assert!(sql.contains("OR fold(l.admin_place) LIKE fold(?2)"));
        assert!(!sql.contains("l.admin_number"));
        assert!(sql.contains("AND fold(l.admin_place) LIKE fold(?3)"));
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(like_pattern("50%_off\\"), "%50\\%\\_off\\\\%");
    }

    #[test]
    fn price_range_is_inclusive_and_active_only() {
        let (_dir, db) = open_temp();
        let seller = user(&db, "seller@example.com");
        for francs in [49, 50, 75, 100, 101] {
            db.create_listing(seller, &listing(francs)).unwrap();
        }
        let sold = db.create_listing(seller, &listing(80)).unwrap();
        let sold_input = ValidListing { status: Some(ListingStatus::Sold), ..listing(80) };
        db.update_listing(sold.id, seller, &sold_input, false).unwrap();
        let gone = db.create_listing(seller, &listing(60)).unwrap();
        db.delete_listing(gone.id, seller).unwrap();

        let filters = ListingFilters {
            min_price: price(50),
            max_price: price(100),
            ..Default::default()
        };
        let found = db.search_listings(&filters).unwrap();
        let mut prices: Vec<i64> = found.iter().map(|l| l.listing.price.cents() / 100).collect();
        prices.sort();
        assert_eq!(prices, vec![50, 75, 100]);
        assert!(found.iter().all(|l| l.listing.status == ListingStatus::Active));
    }

    #[test]
    fn text_search_is_case_insensitive_over_title_or_description() {
        let (_dir, db) = open_temp();
        let seller = user(&db, "seller@example.com");
        let crib = ValidListing {
            title: "Solid Wood Baby Crib".into(),
            description: "Beautiful oak crib, converts to a toddler bed.".into(),
            category: Category::Beds,
            ..listing(280)
        };
        db.create_listing(seller, &crib).unwrap();
        db.create_listing(seller, &listing(120)).unwrap();

        let by_title = ListingFilters { search: Some("CRIB".into()), ..Default::default() };
        assert_eq!(db.search_listings(&by_title).unwrap().len(), 1);

        let by_description = ListingFilters { search: Some("toddler".into()), ..Default::default() };
        let found = db.search_listings(&by_description).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].listing.category, Category::Beds);
        assert_eq!(found[0].owner.email, "seller@example.com");

        let mismatch = ListingFilters {
            search: Some("crib".into()),
            condition: Some(Condition::Fair),
            ..Default::default()
        };
        assert!(db.search_listings(&mismatch).unwrap().is_empty());
    }

    #[test]
    fn text_search_folds_accented_letters() {
        let (_dir, db) = open_temp();
        let seller = user(&db, "seller@example.com");
        let carrier = ValidListing {
            title: "Porte-bébé ergonomique, Genève".into(),
            description: "Écharpe de portage incluse, très bon état.".into(),
            ..listing(90)
        };
        db.create_listing(seller, &carrier).unwrap();
        db.create_listing(seller, &listing(120)).unwrap();

        for term in ["écharpe", "ÉCHARPE", "Écharpe", "GENÈVE", "genève", "BÉBÉ"] {
            let filters = ListingFilters { search: Some(term.into()), ..Default::default() };
            let found = db.search_listings(&filters).unwrap();
            assert_eq!(found.len(), 1, "{} should match", term);
            assert_eq!(found[0].listing.price.cents(), 9_000);
        }

        let admin = ValidListing { admin_place: Some("Dépôt Zürich".into()), ..listing(45) };
        db.create_listing(seller, &admin).unwrap();
        let filters = ListingFilters { admin_place: Some("ZÜRICH".into()), ..Default::default() };
        assert_eq!(db.search_listings(&filters).unwrap().len(), 1);
    }

    #[test]
    fn results_are_newest_first_and_capped() {
        let (_dir, db) = open_temp();
        let seller = user(&db, "seller@example.com");
        for _ in 0..(PAGE_SIZE + 3) {
            db.create_listing(seller, &listing(20)).unwrap();
        }
        let found = db.search_listings(&ListingFilters::default()).unwrap();
        assert_eq!(found.len(), PAGE_SIZE as usize);
        assert!(found
            .windows(2)
            .all(|w| w[0].listing.created_at >= w[1].listing.created_at));
    }

    #[test]
    fn admin_fields_filter_hidden_columns() {
        let (_dir, db) = open_temp();
        let seller = user(&db, "seller@example.com");
        let tagged = ValidListing {
            admin_number: Some("INV-0042".into()),
            admin_place: Some("Warehouse B".into()),
            ..listing(40)
        };
        db.create_listing(seller, &tagged).unwrap();
        db.create_listing(seller, &listing(40)).unwrap();

        let filters = ListingFilters { admin_place: Some("warehouse".into()), ..Default::default() };
        let found = db.search_listings(&filters).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].listing.admin_number.as_deref(), Some("INV-0042"));
    }

    #[test]
    fn views_count_everyone_but_the_owner() {
        let (_dir, db) = open_temp();
        let seller = user(&db, "seller@example.com");
        let buyer = user(&db, "buyer@example.com");
        let created = db.create_listing(seller, &listing(120)).unwrap();

        assert_eq!(db.view_listing(created.id, Some(seller)).unwrap().listing.views, 0);
        assert_eq!(db.view_listing(created.id, Some(buyer)).unwrap().listing.views, 1);
        assert_eq!(db.view_listing(created.id, None).unwrap().listing.views, 2);
        assert_eq!(db.view_listing(created.id, Some(seller)).unwrap().listing.views, 2);
    }

    #[test]
    fn only_the_owner_may_edit_or_delete() {
        let (_dir, db) = open_temp();
        let seller = user(&db, "seller@example.com");
        let other = user(&db, "other@example.com");
        let created = db.create_listing(seller, &listing(120)).unwrap();

        let edit = ValidListing { location: Location::Lausanne, ..listing(110) };
        assert!(matches!(db.update_listing(created.id, other, &edit, false), Err(StoreError::Forbidden)));
        assert!(matches!(db.delete_listing(created.id, other), Err(StoreError::Forbidden)));

        let updated = db.update_listing(created.id, seller, &edit, false).unwrap();
        assert_eq!(updated.location, Location::Lausanne);
        assert_eq!(updated.price.cents(), 11_000);
        assert!(updated.updated_at >= created.updated_at);

        db.delete_listing(created.id, seller).unwrap();
        assert!(matches!(db.delete_listing(created.id, seller), Err(StoreError::NotFound)));
        assert!(matches!(db.view_listing(created.id, None), Err(StoreError::NotFound)));
    }

    #[test]
    fn non_admin_edit_keeps_admin_fields() {
        let (_dir, db) = open_temp();
        let seller = user(&db, "seller@example.com");
        let tagged = ValidListing { admin_number: Some("INV-7".into()), ..listing(30) };
        let created = db.create_listing(seller, &tagged).unwrap();

        let updated = db.update_listing(created.id, seller, &listing(35), false).unwrap();
        assert_eq!(updated.admin_number.as_deref(), Some("INV-7"));

        let cleared = db.update_listing(created.id, seller, &listing(35), true).unwrap();
        assert_eq!(cleared.admin_number, None);
    }

    #[test]
    fn owner_listings_and_counts_skip_deleted() {
        let (_dir, db) = open_temp();
        let seller = user(&db, "seller@example.com");
        let a = db.create_listing(seller, &listing(10)).unwrap();
        let b = db.create_listing(seller, &listing(20)).unwrap();
        db.create_listing(seller, &listing(30)).unwrap();
        db.update_listing(a.id, seller, &ValidListing { status: Some(ListingStatus::Sold), ..listing(10) }, false)
            .unwrap();
        db.delete_listing(b.id, seller).unwrap();

        assert_eq!(db.listings_for_user(seller).unwrap().len(), 2);
        assert_eq!(db.listing_counts(seller).unwrap(), ListingCounts { total: 2, active: 1 });
    }
}

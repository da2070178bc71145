//! Clock and id helpers shared by every manager.
//!
//! Small, widely-reused primitive helpers: monotone UTC seconds for
//! `created_utc`/`updated_utc` columns and a random alphanumeric suffix used
//! where the catalog needs a collision-resistant file name component
//! (snapshot archive names).

use rand::distributions::Alphanumeric;
use rand::Rng;

/// Current UTC time in whole seconds since the epoch.
///
/// `chrono::Utc::now()` is monotone enough for row timestamps; the catalog
/// never relies on sub-second ordering.
pub fn now_utc() -> i64 {
    chrono::Utc::now().timestamp()
}

/// A short random alphanumeric suffix, used for disambiguating file names.
pub fn random_suffix(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Internal id: a monotone, dense integer primary key private to the catalog.
pub type InternalId = i64;

/// Unique id: a per-parent densely numbered identifier exposed externally
/// (e.g. a Version's `unique_id` within its Space, a Vector's `unique_id`
/// within its Version).
pub type UniqueId = i64;

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::advisor;
use crate::aggregate::{self, DayBoundary};
use crate::catalog::NutrientCatalog;
use crate::db::Database;
use crate::goals::GoalRegistry;
use crate::models::{
    DailyProgress, GoalEntry, LogEntry, Mood, Nutrient, UserProfile, ValidationError,
    amount_from_value, parse_amount, validate_amount, validate_profile,
};
use crate::store::{
    AI_GOAL_KEY, DOB_KEY, GENDER_KEY, HEIGHT_KEY, KvStore, LOGGED_NUTRIENTS_KEY,
    USER_METRICS_KEY, WEIGHT_KEY, goal_key, read_logs, set_typed,
};

type Listener = Box<dyn Fn() + Send>;

/// Decoded store contents shared by read operations until the next mutation.
#[derive(Debug)]
struct Snapshot {
    logs: Vec<LogEntry>,
    scalars: BTreeMap<String, Value>,
    goals: GoalRegistry,
}

/// Entry point for front ends. Owns the store, the catalog and a read-through
/// snapshot cache that every mutation invalidates.
///
/// Not shareable across threads on its own; wrap it in a `Mutex` to serve
/// concurrent callers.
pub struct NutrientService<S: KvStore = Database> {
    store: S,
    catalog: NutrientCatalog,
    boundary: DayBoundary,
    snapshot: RefCell<Option<Arc<Snapshot>>>,
    listeners: Vec<Listener>,
}

impl NutrientService<Database> {
    pub fn open(db_path: &Path) -> Result<Self> {
        let db = Database::open(db_path)?;
        Ok(Self::with_store(
            db,
            NutrientCatalog::default(),
            DayBoundary::default(),
        ))
    }

    pub fn new_in_memory() -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self::with_store(
            db,
            NutrientCatalog::default(),
            DayBoundary::default(),
        ))
    }
}

impl<S: KvStore> NutrientService<S> {
    pub fn with_store(store: S, catalog: NutrientCatalog, boundary: DayBoundary) -> Self {
        Self {
            store,
            catalog,
            boundary,
            snapshot: RefCell::new(None),
            listeners: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_day_boundary(mut self, boundary: DayBoundary) -> Self {
        self.boundary = boundary;
        self.invalidate();
        self
    }

    pub fn catalog(&self) -> &NutrientCatalog {
        &self.catalog
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn boundary(&self) -> DayBoundary {
        self.boundary
    }

    pub fn today(&self) -> NaiveDate {
        self.boundary.today()
    }

    // --- Cache ---

    /// Drop the cached snapshot and notify listeners. Call after writing to
    /// the store from outside the service.
    pub fn invalidate(&self) {
        self.snapshot.borrow_mut().take();
        for listener in &self.listeners {
            listener();
        }
    }

    pub fn add_invalidation_listener(&mut self, listener: impl Fn() + Send + 'static) {
        self.listeners.push(Box::new(listener));
    }

    fn snapshot(&self) -> Result<Arc<Snapshot>> {
        if let Some(cached) = self.snapshot.borrow().as_ref() {
            return Ok(Arc::clone(cached));
        }

        let snapshot = Arc::new(Snapshot {
            logs: read_logs(&self.store)?,
            scalars: self.store.get_all()?,
            goals: GoalRegistry::load(&self.store)?,
        });
        tracing::debug!(
            logs = snapshot.logs.len(),
            keys = snapshot.scalars.len(),
            "loaded store snapshot"
        );
        *self.snapshot.borrow_mut() = Some(Arc::clone(&snapshot));
        Ok(snapshot)
    }

    /// Accepts a canonical id or a display name.
    fn require_nutrient(&self, nutrient_id: &str) -> Result<&Nutrient, ValidationError> {
        self.catalog
            .resolve_key(nutrient_id)
            .ok_or_else(|| ValidationError::UnknownNutrient(nutrient_id.trim().to_string()))
    }

    // --- Logging ---

    /// Log raw user text. Empty or non-numeric input does nothing.
    pub fn log_input(&self, nutrient_id: &str, raw_amount: &str) -> Result<Option<LogEntry>> {
        let Some(amount) = parse_amount(raw_amount) else {
            tracing::debug!(nutrient = nutrient_id, input = raw_amount, "ignoring non-numeric amount");
            return Ok(None);
        };
        self.log_nutrient(nutrient_id, amount).map(Some)
    }

    pub fn log_nutrient(&self, nutrient_id: &str, amount: f64) -> Result<LogEntry> {
        self.log_nutrient_at(nutrient_id, amount, Utc::now())
    }

    /// Append an entry to the log list, then bump the nutrient's running
    /// total. The two writes are not atomic: if the second fails the entry
    /// stays logged and the error is returned.
    pub fn log_nutrient_at(
        &self,
        nutrient_id: &str,
        amount: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<LogEntry> {
        let nutrient = self.require_nutrient(nutrient_id)?;
        let amount = validate_amount(amount)?;

        let entry = LogEntry {
            id: new_entry_id(timestamp),
            nutrient_id: nutrient.id.clone(),
            name: nutrient.name.clone(),
            amount,
            unit: nutrient.unit.clone(),
            timestamp,
        };

        self.append_log(&entry)?;
        // the log list changed even if the running total write fails below
        self.invalidate();
        self.bump_running_total(&nutrient.id, amount)?;
        self.invalidate();

        tracing::debug!(nutrient = %entry.nutrient_id, amount, "logged intake");
        Ok(entry)
    }

    fn append_log(&self, entry: &LogEntry) -> Result<()> {
        let mut items = match self.store.get(LOGGED_NUTRIENTS_KEY)? {
            Some(Value::Array(items)) => items,
            Some(_) => {
                tracing::warn!(key = LOGGED_NUTRIENTS_KEY, "replacing non-array log list");
                Vec::new()
            }
            None => Vec::new(),
        };
        items.push(serde_json::to_value(entry)?);
        self.store
            .set(LOGGED_NUTRIENTS_KEY, &Value::Array(items))
            .context("Failed to append log entry")
    }

    fn bump_running_total(&self, nutrient_id: &str, amount: f64) -> Result<()> {
        let current = self
            .store
            .get(nutrient_id)?
            .as_ref()
            .and_then(amount_from_value)
            .unwrap_or(0.0);
        self.store
            .set(nutrient_id, &json!(current + amount))
            .with_context(|| format!("Failed to update running total for '{nutrient_id}'"))
    }

    pub fn logs(&self) -> Result<Vec<LogEntry>> {
        Ok(self.snapshot()?.logs.clone())
    }

    /// Remove the log list and every running-total scalar. Goals and the
    /// profile are kept.
    pub fn clear_logs(&self) -> Result<usize> {
        let mut removed = 0;
        if self.store.remove(LOGGED_NUTRIENTS_KEY)? {
            removed += 1;
        }
        for key in self.store.get_all()?.keys() {
            if self.catalog.resolve_key(key).is_some() && self.store.remove(key)? {
                removed += 1;
            }
        }
        self.invalidate();
        Ok(removed)
    }

    pub fn clear_all(&self) -> Result<()> {
        self.store.clear()?;
        self.invalidate();
        Ok(())
    }

    // --- Aggregation ---

    /// Per-nutrient totals for `date`. Running-total scalars carry no date,
    /// so they only fill in gaps for today; other days come from the log
    /// alone.
    pub fn totals_for(&self, date: NaiveDate) -> Result<BTreeMap<String, f64>> {
        let snapshot = self.snapshot()?;
        Ok(self.totals_from(&snapshot, date))
    }

    fn totals_from(&self, snapshot: &Snapshot, date: NaiveDate) -> BTreeMap<String, f64> {
        if date == self.today() {
            aggregate::aggregate_all(
                &snapshot.logs,
                &snapshot.scalars,
                &self.catalog,
                date,
                self.boundary,
            )
        } else {
            aggregate::daily_totals(&snapshot.logs, &self.catalog, date, self.boundary)
        }
    }

    pub fn daily_progress(&self, date: NaiveDate) -> Result<DailyProgress> {
        let snapshot = self.snapshot()?;
        let totals = self.totals_from(&snapshot, date);
        let overall_health = aggregate::overall_health(&totals, &self.catalog);

        Ok(DailyProgress {
            date: date.format("%Y-%m-%d").to_string(),
            nutrients: aggregate::catalog_progress(&totals, &self.catalog),
            goals: aggregate::goal_progress(&totals, snapshot.goals.list()),
            overall_health,
            mood: Mood::from_health(overall_health),
        })
    }

    // --- Goals ---

    /// Track a catalog nutrient with a custom target.
    pub fn set_goal(&self, nutrient_id: &str, max_value: f64) -> Result<GoalEntry> {
        let nutrient = self.require_nutrient(nutrient_id)?;
        let (id, name, unit) = (
            nutrient.id.clone(),
            nutrient.name.clone(),
            nutrient.unit.clone(),
        );
        self.set_goal_entry(&id, &name, &unit, max_value)
    }

    /// Track any nutrient id, including ones outside the catalog.
    pub fn set_goal_entry(
        &self,
        nutrient_id: &str,
        name: &str,
        unit: &str,
        max_value: f64,
    ) -> Result<GoalEntry> {
        let mut registry = GoalRegistry::load(&self.store)?;
        let goal = registry.set_goal(nutrient_id, name, unit, max_value)?.clone();
        registry.save(&self.store)?;
        self.store
            .set(&goal_key(&goal.nutrient_id), &json!(goal.max_value))?;
        self.invalidate();

        tracing::debug!(nutrient = %goal.nutrient_id, max = goal.max_value, "goal set");
        Ok(goal)
    }

    /// Returns whether a goal was removed. Removing an untracked nutrient is
    /// a no-op.
    pub fn remove_goal(&self, nutrient_id: &str) -> Result<bool> {
        let mut registry = GoalRegistry::load(&self.store)?;
        let Some(stored_id) = registry.get(nutrient_id).map(|g| g.nutrient_id.clone()) else {
            return Ok(false);
        };

        registry.remove_goal(&stored_id);
        registry.save(&self.store)?;
        self.store.remove(&goal_key(&stored_id))?;
        self.invalidate();
        Ok(true)
    }

    pub fn list_goals(&self) -> Result<Vec<GoalEntry>> {
        Ok(self.snapshot()?.goals.list().to_vec())
    }

    // --- Profile ---

    /// Store body metrics under `userMetrics` and mirror them to the
    /// individual `height`, `weight`, `gender` and `dob` keys.
    pub fn set_profile(&self, profile: &UserProfile) -> Result<()> {
        validate_profile(profile)?;
        set_typed(&self.store, USER_METRICS_KEY, profile)?;

        let mirrored = [
            (HEIGHT_KEY, profile.height.map(|h| json!(h.value.to_string()))),
            (WEIGHT_KEY, profile.weight.map(|w| json!(w.value.to_string()))),
            (GENDER_KEY, profile.sex.as_ref().map(|s| json!(s))),
            (
                DOB_KEY,
                profile
                    .date_of_birth
                    .map(|d| json!(d.format("%Y-%m-%d").to_string())),
            ),
        ];
        for (key, value) in mirrored {
            match value {
                Some(v) => self.store.set(key, &v)?,
                None => {
                    self.store.remove(key)?;
                }
            }
        }

        self.invalidate();
        Ok(())
    }

    /// Stored body metrics. Fields that cannot be decoded (such as bare
    /// height or weight strings with no unit) are treated as unset.
    pub fn profile(&self) -> Result<UserProfile> {
        let Some(value) = self.store.get(USER_METRICS_KEY)? else {
            return Ok(UserProfile::default());
        };
        match serde_json::from_value::<UserProfile>(value.clone()) {
            Ok(profile) => Ok(profile),
            Err(e) => {
                tracing::warn!(error = %e, "stored profile is partly unreadable, keeping usable fields");
                Ok(salvage_profile(&value))
            }
        }
    }

    // --- AI goal ---

    /// Build the advisor prompt from the stored profile and today's totals.
    pub fn prepare_ai_prompt(&self) -> Result<String> {
        let today = self.today();
        let profile = self.profile()?;
        let totals = self.totals_for(today)?;
        Ok(advisor::build_prompt(&profile, &totals, today)?)
    }

    /// Persist a successful recommendation verbatim. A failed or empty
    /// outcome is logged and the previously stored value is kept.
    pub fn record_ai_goal(&self, outcome: Result<String>) -> Result<Option<String>> {
        match outcome {
            Ok(text) if !text.trim().is_empty() => {
                self.store.set(AI_GOAL_KEY, &json!(text))?;
                self.invalidate();
                Ok(Some(text))
            }
            Ok(_) => {
                tracing::warn!("advisor returned an empty recommendation");
                Ok(None)
            }
            Err(e) => {
                tracing::warn!(error = %format!("{e:#}"), "advisor request failed");
                Ok(None)
            }
        }
    }

    pub fn ai_goal(&self) -> Result<Option<String>> {
        Ok(self
            .store
            .get(AI_GOAL_KEY)?
            .and_then(|v| v.as_str().map(str::to_string)))
    }
}

fn salvage_profile(value: &Value) -> UserProfile {
    fn field<T: serde::de::DeserializeOwned>(value: &Value, key: &str) -> Option<T> {
        let raw = value.get(key).filter(|v| !v.is_null())?;
        match serde_json::from_value(raw.clone()) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(field = key, error = %e, "dropping unreadable profile field");
                None
            }
        }
    }

    UserProfile {
        sex: field::<String>(value, "sex").filter(|s| !s.trim().is_empty()),
        height: field(value, "height"),
        weight: field(value, "weight"),
        date_of_birth: field(value, "dateOfBirth"),
    }
}

fn new_entry_id(timestamp: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", timestamp.timestamp_millis(), &suffix[..8])
}

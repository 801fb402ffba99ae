//! Persisted notices and group membership.

use super::models::{NoticeRecord, NoticeType};
use crate::option_store::OptionStore;
use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub type GroupIndex = IndexMap<String, Vec<String>>;

/// CRUD over the notice map and the group index, both kept as JSON objects
/// in the option store.
///
/// Entries that fail to parse are skipped on reads but kept on disk, so a
/// write never destroys data this version cannot understand.
pub struct NoticeStore {
    options: Arc<dyn OptionStore>,
    notices_key: String,
    groups_key: String,
}

impl NoticeStore {
    pub fn new(
        options: Arc<dyn OptionStore>,
        notices_key: impl Into<String>,
        groups_key: impl Into<String>,
    ) -> Self {
        Self {
            options,
            notices_key: notices_key.into(),
            groups_key: groups_key.into(),
        }
    }

    /// All parseable notices, in insertion order.
    pub fn list(&self) -> Result<Vec<NoticeRecord>> {
        Ok(self
            .load_raw_notices()?
            .into_iter()
            .filter_map(|(id, raw)| parse_record(&id, raw))
            .collect())
    }

    pub fn get(&self, id: &str) -> Result<Option<NoticeRecord>> {
        let mut notices = self.load_raw_notices()?;
        Ok(notices
            .shift_remove(id)
            .and_then(|raw| parse_record(id, raw)))
    }

    /// Adds a notice. Returns false without touching storage when `id` is
    /// empty, when the fields carry neither a title nor a message, or when a
    /// notice with this id already exists.
    ///
    /// `group` decides group membership; a group set in `fields` is ignored.
    pub fn add(
        &self,
        id: &str,
        notice_type: NoticeType,
        fields: NoticeRecord,
        group: Option<&str>,
    ) -> Result<bool> {
        if id.is_empty() || !fields.has_text() {
            debug!("Ignoring notice {:?}: missing id or text", id);
            return Ok(false);
        }

        let mut notices = self.load_raw_notices()?;
        if notices.contains_key(id) {
            debug!("Ignoring notice {}: already exists", id);
            return Ok(false);
        }

        let mut record = fields;
        record.apply_defaults(id, notice_type);
        record.group = group.filter(|g| !g.is_empty()).map(str::to_string);

        let value = serde_json::to_value(&record)
            .with_context(|| format!("Failed to encode notice {}", id))?;
        notices.insert(id.to_string(), value);
        let notices_json = serde_json::to_string(&notices)?;

        match &record.group {
            Some(group_id) => {
                let mut groups = self.groups()?;
                groups
                    .entry(group_id.clone())
                    .or_default()
                    .push(id.to_string());
                let groups_json = serde_json::to_string(&groups)?;
                self.options.set_options(&[
                    (self.notices_key.as_str(), notices_json.as_str()),
                    (self.groups_key.as_str(), groups_json.as_str()),
                ])?;
            }
            None => self.options.set_option(&self.notices_key, &notices_json)?,
        }

        info!("Added {} notice {}", type_label(&record), id);
        Ok(true)
    }

    /// Removes a notice and its group membership. Returns false if there was
    /// nothing to remove.
    pub fn remove(&self, id: &str) -> Result<bool> {
        let mut notices = self.load_raw_notices()?;
        let Some(raw) = notices.shift_remove(id) else {
            debug!("Nothing to remove for notice {}", id);
            return Ok(false);
        };
        let notices_json = serde_json::to_string(&notices)?;

        let group_id = raw.get("group").and_then(Value::as_str).filter(|g| !g.is_empty());
        let mut groups = self.groups()?;
        match group_id.and_then(|group_id| groups.get_mut(group_id)) {
            Some(members) => {
                members.retain(|member| member != id);
                let groups_json = serde_json::to_string(&groups)?;
                self.options.set_options(&[
                    (self.notices_key.as_str(), notices_json.as_str()),
                    (self.groups_key.as_str(), groups_json.as_str()),
                ])?;
            }
            None => self.options.set_option(&self.notices_key, &notices_json)?,
        }

        info!("Removed notice {}", id);
        Ok(true)
    }

    pub fn remove_all(&self) -> Result<()> {
        self.options
            .set_options(&[(self.notices_key.as_str(), "{}"), (self.groups_key.as_str(), "{}")])?;
        info!("Removed all notices");
        Ok(())
    }

    /// Ids belonging to `group_id`, in the order they were added.
    pub fn group(&self, group_id: &str) -> Result<Vec<String>> {
        Ok(self.groups()?.shift_remove(group_id).unwrap_or_default())
    }

    pub fn groups(&self) -> Result<GroupIndex> {
        match self.options.get_option(&self.groups_key)? {
            Some(raw) if !raw.trim().is_empty() => serde_json::from_str(&raw)
                .with_context(|| format!("Option {} is not a valid group index", self.groups_key)),
            _ => Ok(GroupIndex::new()),
        }
    }

    fn load_raw_notices(&self) -> Result<IndexMap<String, Value>> {
        match self.options.get_option(&self.notices_key)? {
            Some(raw) if !raw.trim().is_empty() => serde_json::from_str(&raw)
                .with_context(|| format!("Option {} is not a JSON object", self.notices_key)),
            _ => Ok(IndexMap::new()),
        }
    }
}

fn parse_record(id: &str, raw: Value) -> Option<NoticeRecord> {
    match serde_json::from_value::<NoticeRecord>(raw) {
        Ok(mut record) => {
            if record.id.is_empty() {
                record.id = id.to_string();
            }
            Some(record)
        }
        Err(err) => {
            warn!("Skipping malformed notice {}: {}", id, err);
            None
        }
    }
}

fn type_label(record: &NoticeRecord) -> &str {
    record.notice_type.as_ref().map_or("untyped", NoticeType::as_str)
}

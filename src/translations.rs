//! Translation groups: which objects are translations of one another.
//!
//! Every object with a language owns exactly one row `(group, language, type, id)`.
//! Objects sharing a group id are mutual translations; a group holds at most one
//! object per language. Group ids are allocated here and nowhere else.
//!
//! Mutations never delete another object's row to make room. When a slot is taken,
//! the object being moved aside goes to a fresh singleton group and keeps its
//! language, so concurrent writers can fragment groups but never break the
//! one-object-per-language rule.

use crate::cache::{get_typed, set_typed, ObjectCache};
use crate::db::{translations as rows, Database, GroupId, ObjectId, TranslationRow};
use crate::error::{LangError, LangResult};
use crate::i18n::{Language, LanguageId, LanguageRegistry};
use rusqlite::Connection;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

const OBJECTS_CACHE: &str = "translation_objects";
const GROUPS_CACHE: &str = "translation_groups";

/// Kind of content object a language is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectType {
    Post,
    Page,
    Term,
    Other(String),
}

impl ObjectType {
    pub fn as_str(&self) -> &str {
        match self {
            ObjectType::Post => "post",
            ObjectType::Page => "page",
            ObjectType::Term => "term",
            ObjectType::Other(name) => name,
        }
    }
}

impl From<&str> for ObjectType {
    fn from(value: &str) -> Self {
        match value {
            "post" => ObjectType::Post,
            "page" => ObjectType::Page,
            "term" => ObjectType::Term,
            other => ObjectType::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What `get_translation` answers when the requested language has no member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    /// Report the translation as missing
    NotFound,
    /// Answer with the object that was asked about
    Original,
}

/// Cache keys touched by a mutation.
#[derive(Default)]
struct Touched {
    objects: BTreeSet<(String, ObjectId)>,
    groups: BTreeSet<GroupId>,
}

impl Touched {
    fn row(&mut self, row: &TranslationRow) {
        self.objects.insert((row.object_type.clone(), row.object_id));
        self.groups.insert(row.group_id);
    }
}

pub struct TranslationStore {
    db: Database,
    registry: Arc<LanguageRegistry>,
    cache: Arc<dyn ObjectCache>,
}

impl TranslationStore {
    pub fn new(db: Database, registry: Arc<LanguageRegistry>, cache: Arc<dyn ObjectCache>) -> Self {
        Self {
            db,
            registry,
            cache,
        }
    }

    // ==================== Cached reads ====================

    fn object_key(object_type: &str, object_id: ObjectId) -> String {
        format!("{}:{}", object_type, object_id)
    }

    /// The object's row, if it has a language
    fn membership(&self, object_type: &ObjectType, object_id: ObjectId) -> Option<TranslationRow> {
        let key = Self::object_key(object_type.as_str(), object_id);
        if let Some(cached) = get_typed::<Option<TranslationRow>>(self.cache.as_ref(), OBJECTS_CACHE, &key) {
            return cached;
        }

        match self
            .db
            .with_connection(|conn| rows::find_by_object(conn, object_type.as_str(), object_id))
        {
            Ok(row) => {
                set_typed(self.cache.as_ref(), OBJECTS_CACHE, &key, &row);
                row
            }
            Err(e) => {
                warn!("Failed to read language of {} #{}: {}", object_type, object_id, e);
                None
            }
        }
    }

    /// All rows of a group
    fn members(&self, group_id: GroupId) -> Vec<TranslationRow> {
        let key = group_id.to_string();
        if let Some(cached) = get_typed::<Vec<TranslationRow>>(self.cache.as_ref(), GROUPS_CACHE, &key) {
            return cached;
        }

        match self.db.with_connection(|conn| rows::find_by_group(conn, group_id)) {
            Ok(members) => {
                set_typed(self.cache.as_ref(), GROUPS_CACHE, &key, &members);
                members
            }
            Err(e) => {
                warn!("Failed to read translation group {}: {}", group_id, e);
                Vec::new()
            }
        }
    }

    fn invalidate(&self, touched: &Touched) {
        for (object_type, object_id) in &touched.objects {
            self.cache
                .delete(OBJECTS_CACHE, &Self::object_key(object_type, *object_id));
        }
        for group_id in &touched.groups {
            self.cache.delete(GROUPS_CACHE, &group_id.to_string());
        }
    }

    // ==================== Reads ====================

    /// Language of an object.
    ///
    /// An object without a language reads as the default language only when the
    /// site requires every object to have one.
    pub fn get_language(&self, object_type: &ObjectType, object_id: ObjectId) -> Option<Language> {
        if let Some(row) = self.membership(object_type, object_id) {
            return self.registry.get(row.language_id);
        }

        let settings = self.registry.settings();
        if settings.language_required && settings.is_translatable(object_type.as_str()) {
            return Some(self.registry.default_language());
        }
        None
    }

    /// Group id of an object, if it has a language
    pub fn group_of(&self, object_type: &ObjectType, object_id: ObjectId) -> Option<GroupId> {
        self.membership(object_type, object_id).map(|row| row.group_id)
    }

    /// The member of the object's group in `language_id`.
    pub fn get_translation(
        &self,
        object_type: &ObjectType,
        object_id: ObjectId,
        language_id: LanguageId,
        fallback: Fallback,
    ) -> Option<ObjectId> {
        let found = self
            .get_all_translations(object_type, object_id, true)
            .get(&language_id)
            .copied();

        match (found, fallback) {
            (Some(id), _) => Some(id),
            (None, Fallback::Original) => Some(object_id),
            (None, Fallback::NotFound) => None,
        }
    }

    /// `language id -> object id` for the whole group of an object
    pub fn get_all_translations(
        &self,
        object_type: &ObjectType,
        object_id: ObjectId,
        include_self: bool,
    ) -> BTreeMap<LanguageId, ObjectId> {
        let Some(own) = self.membership(object_type, object_id) else {
            return BTreeMap::new();
        };

        self.members(own.group_id)
            .into_iter()
            .filter(|row| row.object_type == object_type.as_str())
            .filter(|row| include_self || row.object_id != object_id)
            .map(|row| (row.language_id, row.object_id))
            .collect()
    }

    /// Number of objects of a type per language
    pub fn count_by_language(&self, object_type: &ObjectType) -> LangResult<BTreeMap<LanguageId, usize>> {
        self.db
            .with_connection(|conn| rows::count_by_language(conn, object_type.as_str()))
    }

    // ==================== Writes ====================

    fn ensure_translatable(&self, object_type: &ObjectType) -> LangResult<()> {
        if self.registry.settings().is_translatable(object_type.as_str()) {
            Ok(())
        } else {
            Err(LangError::UntranslatableType(object_type.to_string()))
        }
    }

    fn ensure_language(&self, language_id: LanguageId) -> LangResult<Language> {
        self.registry
            .get(language_id)
            .ok_or_else(|| LangError::LanguageNotFound(language_id.to_string()))
    }

    /// Assign a language to an object.
    ///
    /// The object stays in its group unless another member already holds the target
    /// language, in which case it moves to a new singleton group.
    pub fn set_language(
        &self,
        object_type: &ObjectType,
        object_id: ObjectId,
        language_id: LanguageId,
    ) -> LangResult<()> {
        self.ensure_translatable(object_type)?;
        self.ensure_language(language_id)?;

        let mut touched = Touched::default();
        self.db.transaction(|tx| {
            let current = rows::find_by_object(tx, object_type.as_str(), object_id)?;

            let group_id = match &current {
                Some(row) if row.language_id == language_id => return Ok(()),
                Some(row) => {
                    touched.row(row);
                    match rows::find_in_slot(tx, row.group_id, language_id)? {
                        Some(occupant) => {
                            debug!(
                                "{} #{} takes {} #{}'s language; moving it to a new group",
                                object_type, object_id, occupant.object_type, occupant.object_id
                            );
                            rows::next_group_id(tx)?
                        }
                        None => row.group_id,
                    }
                }
                None => rows::next_group_id(tx)?,
            };

            let row = TranslationRow {
                group_id,
                language_id,
                object_type: object_type.as_str().to_string(),
                object_id,
            };
            rows::upsert(tx, &row)?;
            touched.row(&row);
            Ok(())
        })?;

        self.invalidate(&touched);
        if !touched.objects.is_empty() {
            debug!("Set language of {} #{} to {}", object_type, object_id, language_id);
        }
        Ok(())
    }

    /// Link or unlink translations of an object in one batch.
    ///
    /// Each entry places `target` into the object's group under `language`. A
    /// non-positive target unlinks whatever holds that language. Entries for the
    /// object's own language are ignored. An object already occupying the slot is
    /// moved to a new singleton group. Any unknown language fails the whole batch
    /// before anything is written.
    pub fn set_translations(
        &self,
        object_type: &ObjectType,
        object_id: ObjectId,
        translations: &BTreeMap<LanguageId, ObjectId>,
    ) -> LangResult<()> {
        self.ensure_translatable(object_type)?;
        for language_id in translations.keys() {
            self.ensure_language(*language_id)?;
        }

        let type_name = object_type.as_str();
        let mut touched = Touched::default();
        self.db.transaction(|tx| {
            let own = rows::find_by_object(tx, type_name, object_id)?.ok_or_else(|| {
                LangError::ObjectWithoutLanguage {
                    object_type: type_name.to_string(),
                    object_id,
                }
            })?;
            touched.row(&own);

            for (&language_id, &target) in translations {
                if language_id == own.language_id {
                    continue;
                }

                if target <= 0 {
                    detach_slot(tx, own.group_id, language_id, &mut touched)?;
                    continue;
                }
                if target == object_id {
                    continue;
                }

                let previous = rows::find_by_object(tx, type_name, target)?;
                if let Some(previous) = &previous {
                    if previous.group_id == own.group_id && previous.language_id == language_id {
                        continue;
                    }
                    touched.row(previous);
                }

                if let Some(occupant) = rows::find_in_slot(tx, own.group_id, language_id)? {
                    warn!(
                        "{} #{} replaces {} #{} as the {} translation in group {}",
                        object_type,
                        target,
                        occupant.object_type,
                        occupant.object_id,
                        language_id,
                        own.group_id
                    );
                    detach_slot(tx, own.group_id, language_id, &mut touched)?;
                }

                let row = TranslationRow {
                    group_id: own.group_id,
                    language_id,
                    object_type: type_name.to_string(),
                    object_id: target,
                };
                rows::upsert(tx, &row)?;
                touched.row(&row);
            }
            Ok(())
        })?;

        self.invalidate(&touched);
        debug!("Saved translations of {} #{}", object_type, object_id);
        Ok(())
    }

    /// Detach the member holding `language_id` from the object's group.
    ///
    /// The detached object moves to a new group and keeps its language; the other
    /// members are left untouched. Returns the detached object, if any.
    pub fn unlink(
        &self,
        object_type: &ObjectType,
        object_id: ObjectId,
        language_id: LanguageId,
    ) -> LangResult<Option<ObjectId>> {
        self.ensure_language(language_id)?;

        let mut touched = Touched::default();
        let detached = self.db.transaction(|tx| {
            match rows::find_by_object(tx, object_type.as_str(), object_id)? {
                Some(own) => detach_slot(tx, own.group_id, language_id, &mut touched),
                None => Ok(None),
            }
        })?;

        self.invalidate(&touched);
        Ok(detached.map(|row| row.object_id))
    }

    /// Forget an object. The rest of its group is not renumbered.
    pub fn delete_object(&self, object_type: &ObjectType, object_id: ObjectId) -> LangResult<bool> {
        let mut touched = Touched::default();
        let deleted = self.db.transaction(|tx| {
            match rows::find_by_object(tx, object_type.as_str(), object_id)? {
                Some(row) => {
                    rows::delete_object(tx, object_type.as_str(), object_id)?;
                    touched.row(&row);
                    Ok(true)
                }
                None => Ok(false),
            }
        })?;

        self.invalidate(&touched);
        Ok(deleted)
    }

    /// Remove every membership in a language. Objects keep their groups.
    pub fn delete_language(&self, language_id: LanguageId) -> LangResult<usize> {
        let mut touched = Touched::default();
        let deleted = self.db.transaction(|tx| {
            for row in rows::find_by_language(tx, language_id)? {
                touched.row(&row);
            }
            rows::delete_language(tx, language_id)
        })?;

        self.invalidate(&touched);
        debug!("Removed {} memberships of language {}", deleted, language_id);
        Ok(deleted)
    }

    // ==================== Typed shortcuts ====================

    pub fn post_language(&self, post_id: ObjectId) -> Option<Language> {
        self.get_language(&ObjectType::Post, post_id)
    }

    pub fn set_post_language(&self, post_id: ObjectId, language_id: LanguageId) -> LangResult<()> {
        self.set_language(&ObjectType::Post, post_id, language_id)
    }

    pub fn post_translation(&self, post_id: ObjectId, language_id: LanguageId) -> Option<ObjectId> {
        self.get_translation(&ObjectType::Post, post_id, language_id, Fallback::NotFound)
    }

    pub fn term_language(&self, term_id: ObjectId) -> Option<Language> {
        self.get_language(&ObjectType::Term, term_id)
    }

    pub fn set_term_language(&self, term_id: ObjectId, language_id: LanguageId) -> LangResult<()> {
        self.set_language(&ObjectType::Term, term_id, language_id)
    }

    pub fn term_translation(&self, term_id: ObjectId, language_id: LanguageId) -> Option<ObjectId> {
        self.get_translation(&ObjectType::Term, term_id, language_id, Fallback::NotFound)
    }
}

/// Move whoever holds `(group_id, language_id)` into a new group.
///
/// A member that is alone in its group is already detached and stays put.
fn detach_slot(
    conn: &Connection,
    group_id: GroupId,
    language_id: LanguageId,
    touched: &mut Touched,
) -> LangResult<Option<TranslationRow>> {
    let Some(occupant) = rows::find_in_slot(conn, group_id, language_id)? else {
        return Ok(None);
    };
    if rows::find_by_group(conn, group_id)?.len() < 2 {
        return Ok(Some(occupant));
    }

    let moved = TranslationRow {
        group_id: rows::next_group_id(conn)?,
        ..occupant.clone()
    };
    rows::upsert(conn, &moved)?;
    touched.row(&occupant);
    touched.row(&moved);
    debug!(
        "Detached {} #{} from group {} into group {}",
        occupant.object_type, occupant.object_id, group_id, moved.group_id
    );
    Ok(Some(moved))
}

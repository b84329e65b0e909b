//! Set arithmetic behind the reconcilers. Nothing here touches I/O.

use chrono::{DateTime, Utc};
use stagecast_cloud_client::{RemoteMedia, RemoteProjectStamp};
use stagecast_core::models::Media;
use stagecast_core::MediaId;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use uuid::Uuid;

/// Remote projects whose metadata must be fetched: all of them when forced,
/// otherwise the ones unknown locally or whose cached `updatedAt` differs.
pub fn projects_to_refresh(
    remote: &[RemoteProjectStamp],
    local: &HashMap<Uuid, Option<DateTime<Utc>>>,
    force: bool,
) -> Vec<Uuid> {
    remote
        .iter()
        .filter(|stamp| force || local.get(&stamp.id) != Some(&Some(stamp.updated_at)))
        .map(|stamp| stamp.id)
        .collect()
}

/// Names in `required` absent from `existing`, deduplicated, first-seen order.
pub fn names_to_create<'a>(
    required: impl IntoIterator<Item = &'a str>,
    existing: &[&str],
) -> Vec<String> {
    let existing: HashSet<&str> = existing.iter().copied().collect();
    let mut seen = HashSet::new();
    required
        .into_iter()
        .filter(|name| !existing.contains(name) && seen.insert(*name))
        .map(str::to_string)
        .collect()
}

/// Several local rows may share a name; the first one in `items` order wins.
pub fn first_match_by_name<'a, T>(items: &'a [T], name: &str, name_of: impl Fn(&T) -> &str) -> Option<&'a T> {
    items.iter().find(|item| name_of(item) == name)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkDiff<T> {
    pub to_add: Vec<T>,
    pub to_remove: Vec<T>,
}

impl<T> LinkDiff<T> {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

/// Links to insert and delete so that `current` becomes `desired`.
pub fn link_diff<T: Eq + Hash + Clone>(current: &[T], desired: &[T]) -> LinkDiff<T> {
    let current_set: HashSet<&T> = current.iter().collect();
    let desired_set: HashSet<&T> = desired.iter().collect();

    let mut added = HashSet::new();
    let to_add = desired
        .iter()
        .filter(|link| !current_set.contains(link) && added.insert(*link))
        .cloned()
        .collect();
    let mut removed = HashSet::new();
    let to_remove = current
        .iter()
        .filter(|link| !desired_set.contains(link) && removed.insert(*link))
        .cloned()
        .collect();

    LinkDiff { to_add, to_remove }
}

/// Remote media to download: the ones not stored locally yet.
pub fn media_to_mirror<'a>(
    remote: &'a [RemoteMedia],
    local: &HashSet<MediaId>,
) -> Vec<&'a RemoteMedia> {
    let mut seen = HashSet::new();
    remote
        .iter()
        .filter(|media| !local.contains(&media.id) && seen.insert(media.id))
        .collect()
}

/// Media present locally before the sync that the remote no longer references.
pub fn unreferenced(local_before: &[MediaId], remote: &HashSet<MediaId>) -> Vec<MediaId> {
    local_before
        .iter()
        .filter(|id| !remote.contains(id))
        .copied()
        .collect()
}

/// Of the unreferenced rows, only user uploads with no project link are deleted.
/// Derived media go away with their source.
pub fn select_orphans(candidates: &[Media], linked: &HashSet<MediaId>) -> Vec<Media> {
    candidates
        .iter()
        .filter(|media| media.is_user_uploaded && !linked.contains(&media.id))
        .cloned()
        .collect()
}

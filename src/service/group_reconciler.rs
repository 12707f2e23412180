//! §4.3 Group Reconciler: diffs parsed groups against the persisted `Group`
//! set and a Source's `GroupMembership` rows, in a single transaction.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use sqlx::PgPool;

use crate::models::{DomainEvent, Group, GroupId, GroupMembership, ParsedGroupInfo, Source};
use crate::repository::GroupRepository;
use crate::service::event_bus::EventBus;
use crate::Result;

/// The resolved group set for a Source after reconciliation: every
/// currently-enabled group name mapped to its id, used by the upserter to
/// decide whether a parsed stream's group is eligible.
pub type EnabledGroupIds = HashMap<String, GroupId>;

pub struct GroupReconciler {
    pool: PgPool,
    groups: GroupRepository,
    events: EventBus,
}

impl GroupReconciler {
    #[must_use]
    pub fn new(pool: PgPool, groups: GroupRepository, events: EventBus) -> Self {
        Self { pool, groups, events }
    }

    /// Reconcile the parsed group set for one source, returning the ids of
    /// every group with a surviving, enabled membership for this source.
    pub async fn reconcile(
        &self,
        source: &Source,
        parsed_groups: &HashMap<String, ParsedGroupInfo>,
    ) -> Result<EnabledGroupIds> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let mut resolved: HashMap<String, Group> = HashMap::new();
        for name in parsed_groups.keys() {
            if let Some(existing) = self.groups.find_by_name(&mut *tx, name).await? {
                resolved.insert(name.clone(), existing);
            }
        }

        let mut created_group_ids: Vec<GroupId> = Vec::new();
        for name in parsed_groups.keys() {
            if resolved.contains_key(name) {
                continue;
            }
            let group = Group {
                id: GroupId::new(),
                name: name.clone(),
                created_at: now,
            };
            sqlx::query(
                "INSERT INTO groups (id, name, created_at) VALUES ($1, $2, $3) \
                 ON CONFLICT (name) DO NOTHING",
            )
            .bind(group.id.as_str())
            .bind(&group.name)
            .bind(group.created_at)
            .execute(&mut *tx)
            .await?;

            let group = match self.groups.find_by_name(&mut *tx, name).await? {
                Some(g) => g,
                None => group,
            };
            created_group_ids.push(group.id.clone());
            resolved.insert(name.clone(), group);
        }

        let all_memberships = self.groups.list_memberships_for_source(&source.id).await?;
        let by_group_id: HashMap<GroupId, GroupMembership> = all_memberships
            .into_iter()
            .map(|m| (m.group_id.clone(), m))
            .collect();

        let parsed_group_ids: HashSet<GroupId> =
            resolved.values().map(|g| g.id.clone()).collect();

        let mut to_delete: Vec<GroupId> = Vec::new();
        for (group_id, _membership) in &by_group_id {
            if !parsed_group_ids.contains(group_id) {
                to_delete.push(group_id.clone());
            }
        }

        let mut enabled_ids: EnabledGroupIds = HashMap::new();
        let mut updated_group_ids: Vec<GroupId> = Vec::new();
        for (name, group) in &resolved {
            let parsed_info = parsed_groups.get(name);
            let parsed_properties = parsed_custom_properties(parsed_info);

            let membership = match by_group_id.get(&group.id) {
                Some(existing) => {
                    let merged = GroupMembership::merge_custom_properties(
                        &existing.custom_properties,
                        &parsed_properties,
                    );
                    if merged != existing.custom_properties {
                        updated_group_ids.push(group.id.clone());
                    }
                    GroupMembership {
                        source_id: source.id.clone(),
                        group_id: group.id.clone(),
                        group_name: group.name.clone(),
                        enabled: existing.enabled,
                        custom_properties: merged,
                        created_at: existing.created_at,
                        updated_at: now,
                    }
                }
                None => GroupMembership {
                    source_id: source.id.clone(),
                    group_id: group.id.clone(),
                    group_name: group.name.clone(),
                    enabled: true,
                    custom_properties: parsed_properties,
                    created_at: now,
                    updated_at: now,
                },
            };

            self.groups.upsert_membership_with_executor(&mut *tx, &membership).await?;
            if membership.enabled {
                enabled_ids.insert(name.clone(), group.id.clone());
            }
        }

        for group_id in &to_delete {
            self.groups
                .delete_membership_with_executor(&mut *tx, &source.id, group_id)
                .await?;
        }

        tx.commit().await?;

        for group_id in &to_delete {
            self.groups.delete_if_orphaned(group_id).await?;
        }

        // Published only after commit: these are notifications of persisted
        // fact, not part of the transaction they describe.
        for group_id in &created_group_ids {
            self.events.publish(&DomainEvent::GroupCreated { group_id: group_id.clone() }).await;
        }
        for group_id in &updated_group_ids {
            self.events.publish(&DomainEvent::GroupUpdated { group_id: group_id.clone() }).await;
        }
        for group_id in &to_delete {
            self.events.publish(&DomainEvent::GroupDeleted { group_id: group_id.clone() }).await;
        }

        Ok(enabled_ids)
    }
}

fn parsed_custom_properties(info: Option<&ParsedGroupInfo>) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    if let Some(info) = info {
        if let Some(xc_id) = &info.xc_id {
            map.insert(
                crate::models::custom_property_keys::XC_ID.to_string(),
                serde_json::Value::String(xc_id.clone()),
            );
        }
    }
    serde_json::Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::custom_property_keys;

    #[test]
    fn parsed_properties_carry_xc_id_when_present() {
        let info = ParsedGroupInfo { xc_id: Some("42".to_string()) };
        let props = parsed_custom_properties(Some(&info));
        assert_eq!(props[custom_property_keys::XC_ID], "42");
    }

    #[test]
    fn parsed_properties_are_empty_without_xc_id() {
        let props = parsed_custom_properties(Some(&ParsedGroupInfo { xc_id: None }));
        assert_eq!(props, serde_json::json!({}));
    }

    #[test]
    fn merge_rule_preserves_user_keys_on_reconcile() {
        let existing = serde_json::json!({
            custom_property_keys::XC_ID: "old",
            custom_property_keys::AUTO_CHANNEL_SYNC: true,
        });
        let parsed = serde_json::json!({ custom_property_keys::XC_ID: "new" });
        let merged = GroupMembership::merge_custom_properties(&existing, &parsed);
        assert_eq!(merged[custom_property_keys::XC_ID], "new");
        assert_eq!(merged[custom_property_keys::AUTO_CHANNEL_SYNC], true);
    }
}

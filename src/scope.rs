//! Access scoping.
//!
//! Every lead, agent and category operation is answered from the subset of
//! records the caller is entitled to. A record outside that subset is simply
//! absent; callers report it as not found, never as forbidden, so the existence
//! of another tenant's data is not observable.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::Lead;

/// Principal
///
/// The resolved role of an authenticated caller. Built from the organization
/// or agent row that references the user, so the two roles cannot both apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Principal {
    Organization { org_id: i64 },
    Agent { agent_id: i64, org_id: i64 },
}

impl Principal {
    /// The tenant the principal belongs to.
    pub fn org_id(&self) -> i64 {
        match *self {
            Principal::Organization { org_id } | Principal::Agent { org_id, .. } => org_id,
        }
    }

    /// Scope for lead detail and lead category updates.
    pub fn lead_scope(&self) -> LeadScope {
        match *self {
            Principal::Organization { org_id } => LeadScope::organization(org_id),
            Principal::Agent { agent_id, org_id } => LeadScope {
                org_id,
                agent_id: Some(agent_id),
            },
        }
    }

    /// Queries behind the lead list. Organizations see assigned leads, plus the
    /// unassigned ones as a second collection; agents see their own leads only.
    pub fn lead_list(&self) -> LeadListing {
        match *self {
            Principal::Organization { org_id } => LeadListing {
                primary: LeadQuery {
                    scope: LeadScope::organization(org_id),
                    assignment: Assignment::Assigned,
                    category: None,
                },
                unassigned: Some(LeadQuery {
                    scope: LeadScope::organization(org_id),
                    assignment: Assignment::Unassigned,
                    category: None,
                }),
            },
            Principal::Agent { .. } => LeadListing {
                primary: LeadQuery {
                    scope: self.lead_scope(),
                    assignment: Assignment::Any,
                    category: None,
                },
                unassigned: None,
            },
        }
    }

    /// Leads of one category, as far as the principal may see them.
    pub fn category_leads(&self, category_id: i64) -> LeadQuery {
        LeadQuery {
            scope: self.lead_scope(),
            assignment: Assignment::Any,
            category: Some(category_id),
        }
    }

    /// Categories are shared by everyone in the tenant.
    pub fn category_scope(&self) -> i64 {
        self.org_id()
    }

    /// Whether the category list carries the count of uncategorized leads.
    pub fn counts_uncategorized(&self) -> bool {
        matches!(self, Principal::Organization { .. })
    }
}

/// LeadScope
///
/// Restricts lead lookups to one organization and, for agents, to the leads
/// assigned to that agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeadScope {
    pub org_id: i64,
    pub agent_id: Option<i64>,
}

impl LeadScope {
    /// Every lead of the organization. Used by organization-only mutations.
    pub fn organization(org_id: i64) -> Self {
        Self {
            org_id,
            agent_id: None,
        }
    }

    pub fn admits(&self, lead: &Lead) -> bool {
        lead.organization_id == self.org_id
            && match self.agent_id {
                Some(agent_id) => lead.agent_id == Some(agent_id),
                None => true,
            }
    }
}

/// Assignment
///
/// Filter on whether a lead has an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignment {
    Any,
    Assigned,
    Unassigned,
}

impl Assignment {
    pub fn matches(&self, agent_id: Option<i64>) -> bool {
        match self {
            Assignment::Any => true,
            Assignment::Assigned => agent_id.is_some(),
            Assignment::Unassigned => agent_id.is_none(),
        }
    }
}

/// LeadQuery
///
/// A scoped lead collection. Results are ordered by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeadQuery {
    pub scope: LeadScope,
    pub assignment: Assignment,
    pub category: Option<i64>,
}

impl LeadQuery {
    pub fn matches(&self, lead: &Lead) -> bool {
        self.scope.admits(lead)
            && self.assignment.matches(lead.agent_id)
            && self.category.is_none_or(|id| lead.category_id == Some(id))
    }
}

/// LeadListing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeadListing {
    pub primary: LeadQuery,
    pub unassigned: Option<LeadQuery>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORG: i64 = 1;
    const OTHER_ORG: i64 = 2;

    fn lead(id: i64, org: i64, agent: Option<i64>, category: Option<i64>) -> Lead {
        Lead {
            id,
            organization_id: org,
            agent_id: agent,
            category_id: category,
            ..Lead::default()
        }
    }

    fn fixture() -> Vec<Lead> {
        vec![
            lead(1, ORG, Some(10), None),
            lead(2, ORG, Some(11), Some(100)),
            lead(3, ORG, None, None),
            lead(4, OTHER_ORG, Some(20), None),
            lead(5, OTHER_ORG, None, None),
        ]
    }

    fn ids(query: &LeadQuery, leads: &[Lead]) -> Vec<i64> {
        leads.iter().filter(|l| query.matches(l)).map(|l| l.id).collect()
    }

    #[test]
    fn organization_lists_assigned_leads_and_unassigned_separately() {
        let listing = Principal::Organization { org_id: ORG }.lead_list();
        let leads = fixture();

        assert_eq!(ids(&listing.primary, &leads), vec![1, 2]);
        let unassigned = listing.unassigned.expect("organizations get unassigned leads");
        assert_eq!(ids(&unassigned, &leads), vec![3]);
    }

    #[test]
    fn organization_sees_every_lead_of_its_tenant_across_both_collections() {
        let listing = Principal::Organization { org_id: ORG }.lead_list();
        let unassigned = listing.unassigned.unwrap();
        for l in fixture() {
            let visible = listing.primary.matches(&l) || unassigned.matches(&l);
            assert_eq!(visible, l.organization_id == ORG, "lead {}", l.id);
        }
    }

    #[test]
    fn agent_lists_only_its_own_leads() {
        let agent = Principal::Agent { agent_id: 10, org_id: ORG };
        let listing = agent.lead_list();

        assert_eq!(ids(&listing.primary, &fixture()), vec![1]);
        assert!(listing.unassigned.is_none());
    }

    #[test]
    fn unassigned_leads_are_invisible_to_every_agent() {
        for agent_id in [10, 11, 20] {
            let org_id = if agent_id == 20 { OTHER_ORG } else { ORG };
            let scope = Principal::Agent { agent_id, org_id }.lead_scope();
            assert!(!scope.admits(&lead(3, ORG, None, None)));
            assert!(!scope.admits(&lead(5, OTHER_ORG, None, None)));
        }
    }

    #[test]
    fn agent_id_from_another_tenant_does_not_widen_scope() {
        // Same agent id number, different organization.
        let scope = Principal::Agent { agent_id: 20, org_id: ORG }.lead_scope();
        assert!(!scope.admits(&lead(4, OTHER_ORG, Some(20), None)));
    }

    #[test]
    fn detail_scope_of_organization_covers_unassigned_leads() {
        let scope = Principal::Organization { org_id: ORG }.lead_scope();
        assert!(scope.admits(&lead(3, ORG, None, None)));
        assert!(!scope.admits(&lead(5, OTHER_ORG, None, None)));
    }

    #[test]
    fn category_leads_respect_the_lead_scope() {
        let leads = fixture();
        let org = Principal::Organization { org_id: ORG };
        assert_eq!(ids(&org.category_leads(100), &leads), vec![2]);

        let other_agent = Principal::Agent { agent_id: 10, org_id: ORG };
        assert!(ids(&other_agent.category_leads(100), &leads).is_empty());
    }

    #[test]
    fn only_organizations_count_uncategorized_leads() {
        assert!(Principal::Organization { org_id: ORG }.counts_uncategorized());
        assert!(!Principal::Agent { agent_id: 10, org_id: ORG }.counts_uncategorized());
        assert_eq!(Principal::Agent { agent_id: 10, org_id: ORG }.category_scope(), ORG);
    }

    #[test]
    fn principal_serializes_with_a_role_tag() {
        let json = serde_json::to_value(Principal::Agent { agent_id: 3, org_id: 7 }).unwrap();
        assert_eq!(json["role"], "agent");
        assert_eq!(json["agent_id"], 3);
        assert_eq!(json["org_id"], 7);
    }
}

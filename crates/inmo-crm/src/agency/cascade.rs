//! Side effects of a change in a client's commercial flags.
//!
//! The rules run in a fixed order against a snapshot of the client's portfolio:
//!
//! 1. buyer unset: every property sold to the client is released;
//! 2. pre-sale requested: every selected property that is not sold is reserved;
//! 3. buyer set with purchases: every purchased property is sold to the client and
//!    every interaction on another property is discarded;
//! 4. squatter flagged: every interaction of the client is discarded.
//!
//! [`compute_side_effects`] is pure; the resulting [`Mutation`]s are applied by the
//! caller inside the same unit of work as the client update.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::domain::{ClientFlags, ClientId, InteractionId, InterestStatus, Property, PropertyId};
use super::records::AgencyRecords;

/// Flags before and after a client edit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlagChange {
    pub previous: ClientFlags,
    pub next: ClientFlags,
}

impl FlagChange {
    pub fn buyer_unset(&self) -> bool {
        self.previous.comprador_final && !self.next.comprador_final
    }

    pub fn squatter_flagged(&self) -> bool {
        !self.previous.posible_ocupa && self.next.posible_ocupa
    }
}

/// Property selections submitted with a client edit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CascadeSelections {
    pub pre_venta: bool,
    pub pre_sale_ids: Vec<PropertyId>,
    pub purchased_ids: Vec<PropertyId>,
}

impl CascadeSelections {
    fn selected(&self) -> impl Iterator<Item = PropertyId> + '_ {
        self.pre_sale_ids
            .iter()
            .chain(self.purchased_ids.iter())
            .copied()
    }
}

/// Snapshot of everything the rules can touch for one client.
#[derive(Debug, Clone, Default)]
pub struct ClientPortfolio {
    pub properties: BTreeMap<PropertyId, Property>,
    pub interactions: Vec<(InteractionId, PropertyId, InterestStatus)>,
}

impl ClientPortfolio {
    /// Copies the properties sold to `client`, the selected properties and the
    /// client's interactions out of the records.
    pub fn collect(
        records: &AgencyRecords,
        client: ClientId,
        selections: &CascadeSelections,
    ) -> Result<Self, CascadeError> {
        let mut properties = BTreeMap::new();
        for property in records.properties_sold_to(client) {
            properties.insert(property.id, property.clone());
        }
        for id in selections.selected() {
            let property = records
                .property(id)
                .ok_or(CascadeError::UnknownProperty(id))?;
            properties.insert(id, property.clone());
        }

        let interactions = records
            .interactions_of(client)
            .into_iter()
            .map(|interaction| (interaction.id, interaction.property_id, interaction.status))
            .collect();

        Ok(Self {
            properties,
            interactions,
        })
    }
}

/// A single state change produced by the rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Mutation {
    Release {
        property: PropertyId,
    },
    PreSell {
        property: PropertyId,
        client: ClientId,
    },
    Sell {
        property: PropertyId,
        client: ClientId,
    },
    Discard {
        interaction: InteractionId,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CascadeError {
    #[error("property {0} not found")]
    UnknownProperty(PropertyId),
}

/// Evaluates the cascade rules in order and returns the mutations that change state.
///
/// Running it again on the state those mutations produce yields no mutations.
pub fn compute_side_effects(
    client: ClientId,
    change: FlagChange,
    selections: &CascadeSelections,
    portfolio: &ClientPortfolio,
) -> Result<Vec<Mutation>, CascadeError> {
    let mut properties = portfolio.properties.clone();
    let mut statuses: BTreeMap<InteractionId, InterestStatus> = portfolio
        .interactions
        .iter()
        .map(|(id, _, status)| (*id, *status))
        .collect();
    let mut mutations = Vec::new();

    if change.buyer_unset() {
        for property in properties.values_mut() {
            if property.is_sold() && property.sold_client() == Some(client) && property.release() {
                mutations.push(Mutation::Release {
                    property: property.id,
                });
            }
        }
    }

    if selections.pre_venta {
        for id in &selections.pre_sale_ids {
            let property = properties
                .get_mut(id)
                .ok_or(CascadeError::UnknownProperty(*id))?;
            if property.set_pre_sold(client) {
                mutations.push(Mutation::PreSell {
                    property: *id,
                    client,
                });
            }
        }
    }

    if change.next.comprador_final && !selections.purchased_ids.is_empty() {
        for id in &selections.purchased_ids {
            let property = properties
                .get_mut(id)
                .ok_or(CascadeError::UnknownProperty(*id))?;
            if property.set_sold(client) {
                mutations.push(Mutation::Sell {
                    property: *id,
                    client,
                });
            }
        }

        let purchased: BTreeSet<PropertyId> = selections.purchased_ids.iter().copied().collect();
        for (interaction, property, _) in &portfolio.interactions {
            if !purchased.contains(property) {
                discard(&mut statuses, *interaction, &mut mutations);
            }
        }
    }

    if change.squatter_flagged() {
        for (interaction, _, _) in &portfolio.interactions {
            discard(&mut statuses, *interaction, &mut mutations);
        }
    }

    Ok(mutations)
}

fn discard(
    statuses: &mut BTreeMap<InteractionId, InterestStatus>,
    interaction: InteractionId,
    mutations: &mut Vec<Mutation>,
) {
    if let Some(status) = statuses.get_mut(&interaction) {
        if !status.is_discarded() {
            *status = InterestStatus::DISCARDED;
            mutations.push(Mutation::Discard { interaction });
        }
    }
}

impl AgencyRecords {
    /// Applies one cascade mutation to the records.
    pub fn apply(&mut self, mutation: Mutation) -> Result<(), CascadeError> {
        match mutation {
            Mutation::Release { property } => {
                self.property_mut(property)
                    .ok_or(CascadeError::UnknownProperty(property))?
                    .release();
            }
            Mutation::PreSell { property, client } => {
                self.property_mut(property)
                    .ok_or(CascadeError::UnknownProperty(property))?
                    .set_pre_sold(client);
            }
            Mutation::Sell { property, client } => {
                self.property_mut(property)
                    .ok_or(CascadeError::UnknownProperty(property))?
                    .set_sold(client);
            }
            Mutation::Discard { interaction } => {
                if let Some(entry) = self.interaction_mut(interaction) {
                    entry.status = InterestStatus::DISCARDED;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLIENT: ClientId = ClientId(1);
    const OTHER: ClientId = ClientId(2);

    fn flags(comprador_final: bool, posible_ocupa: bool) -> ClientFlags {
        ClientFlags {
            posible_ocupa,
            comprador_final,
        }
    }

    fn portfolio(properties: Vec<Property>, interactions: &[(u64, u64)]) -> ClientPortfolio {
        ClientPortfolio {
            properties: properties.into_iter().map(|p| (p.id, p)).collect(),
            interactions: interactions
                .iter()
                .map(|(id, property)| {
                    (
                        InteractionId(*id),
                        PropertyId(*property),
                        InterestStatus::AmarilloNegociando,
                    )
                })
                .collect(),
        }
    }

    fn property(id: u64) -> Property {
        Property::new(PropertyId(id), format!("SOL-{id:03}"))
    }

    fn sold_to(id: u64, client: ClientId) -> Property {
        let mut p = property(id);
        p.set_sold(client);
        p
    }

    #[test]
    fn unsetting_buyer_releases_only_own_sales() {
        let change = FlagChange {
            previous: flags(true, false),
            next: flags(false, false),
        };
        let snapshot = portfolio(vec![sold_to(1, CLIENT), sold_to(2, OTHER)], &[]);

        let mutations =
            compute_side_effects(CLIENT, change, &CascadeSelections::default(), &snapshot)
                .expect("cascade");
        assert_eq!(
            mutations,
            vec![Mutation::Release {
                property: PropertyId(1)
            }]
        );
    }

    #[test]
    fn purchase_sells_selection_and_discards_the_rest() {
        let change = FlagChange {
            previous: flags(false, false),
            next: flags(true, false),
        };
        let selections = CascadeSelections {
            purchased_ids: vec![PropertyId(1)],
            ..CascadeSelections::default()
        };
        let snapshot = portfolio(vec![property(1)], &[(10, 1), (11, 2)]);

        let mutations = compute_side_effects(CLIENT, change, &selections, &snapshot).expect("cascade");
        assert_eq!(
            mutations,
            vec![
                Mutation::Sell {
                    property: PropertyId(1),
                    client: CLIENT
                },
                Mutation::Discard {
                    interaction: InteractionId(11)
                },
            ]
        );
    }

    #[test]
    fn buyer_without_purchases_changes_nothing() {
        let change = FlagChange {
            previous: flags(false, false),
            next: flags(true, false),
        };
        let snapshot = portfolio(vec![], &[(10, 1)]);
        let mutations =
            compute_side_effects(CLIENT, change, &CascadeSelections::default(), &snapshot)
                .expect("cascade");
        assert!(mutations.is_empty());
    }

    #[test]
    fn pre_sale_skips_sold_properties() {
        let selections = CascadeSelections {
            pre_venta: true,
            pre_sale_ids: vec![PropertyId(1), PropertyId(2)],
            ..CascadeSelections::default()
        };
        let snapshot = portfolio(vec![property(1), sold_to(2, OTHER)], &[]);

        let mutations =
            compute_side_effects(CLIENT, FlagChange::default(), &selections, &snapshot)
                .expect("cascade");
        assert_eq!(
            mutations,
            vec![Mutation::PreSell {
                property: PropertyId(1),
                client: CLIENT
            }]
        );
    }

    #[test]
    fn pre_sale_sees_releases_from_the_first_rule() {
        let change = FlagChange {
            previous: flags(true, false),
            next: flags(false, false),
        };
        let selections = CascadeSelections {
            pre_venta: true,
            pre_sale_ids: vec![PropertyId(1)],
            ..CascadeSelections::default()
        };
        let snapshot = portfolio(vec![sold_to(1, CLIENT)], &[]);

        let mutations = compute_side_effects(CLIENT, change, &selections, &snapshot).expect("cascade");
        assert_eq!(
            mutations,
            vec![
                Mutation::Release {
                    property: PropertyId(1)
                },
                Mutation::PreSell {
                    property: PropertyId(1),
                    client: CLIENT
                },
            ]
        );
    }

    #[test]
    fn squatter_discards_each_interaction_once() {
        let change = FlagChange {
            previous: flags(false, false),
            next: flags(true, true),
        };
        let selections = CascadeSelections {
            purchased_ids: vec![PropertyId(1)],
            ..CascadeSelections::default()
        };
        let snapshot = portfolio(vec![property(1)], &[(10, 1), (11, 2)]);

        let mutations = compute_side_effects(CLIENT, change, &selections, &snapshot).expect("cascade");
        let discards: Vec<_> = mutations
            .iter()
            .filter(|m| matches!(m, Mutation::Discard { .. }))
            .collect();
        assert_eq!(discards.len(), 2);
    }

    #[test]
    fn already_discarded_interactions_are_left_alone() {
        let change = FlagChange {
            previous: flags(false, false),
            next: flags(false, true),
        };
        let mut snapshot = portfolio(vec![], &[(10, 1)]);
        snapshot.interactions[0].2 = InterestStatus::RosaDescarta;

        let mutations =
            compute_side_effects(CLIENT, change, &CascadeSelections::default(), &snapshot)
                .expect("cascade");
        assert!(mutations.is_empty());
    }

    #[test]
    fn unknown_selected_property_fails_the_whole_cascade() {
        let selections = CascadeSelections {
            pre_venta: true,
            pre_sale_ids: vec![PropertyId(99)],
            ..CascadeSelections::default()
        };
        let err = compute_side_effects(
            CLIENT,
            FlagChange::default(),
            &selections,
            &ClientPortfolio::default(),
        )
        .expect_err("unknown property");
        assert_eq!(err, CascadeError::UnknownProperty(PropertyId(99)));
    }
}

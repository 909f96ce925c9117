use super::{
    AgentPlacement, BuildingLayout, CapacityExceeded, LayoutError, OverflowPolicy, PlacementArea,
    RosterSignature,
};
use crate::office::OfficeId;
use crate::template::{OfficeTemplate, TemplateSet};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Place a roster into a template.
///
/// Pure function of the template, the signature and the policy: agents in
/// lexical id order take seats in seat order, extra agents go to the
/// overflow strip or stay unseated depending on the policy.
pub fn compute_layout(
    template: &Arc<OfficeTemplate>,
    signature: RosterSignature,
    policy: OverflowPolicy,
) -> BuildingLayout {
    let seats = template.seats();
    let requested = signature.members.len();

    let mut placements = Vec::with_capacity(requested);
    let mut unseated = Vec::new();

    for (index, agent_id) in signature.members.iter().enumerate() {
        if let Some(seat) = seats.get(index) {
            placements.push(AgentPlacement {
                agent_id: agent_id.clone(),
                area: PlacementArea::Room(seat.room.clone()),
                cell: seat.cell,
            });
            continue;
        }

        match policy {
            OverflowPolicy::Spill => placements.push(AgentPlacement {
                agent_id: agent_id.clone(),
                area: PlacementArea::Overflow,
                cell: template.overflow_cell(index - seats.len()),
            }),
            OverflowPolicy::Report => unseated.push(agent_id.clone()),
        }
    }

    let capacity = (requested > seats.len()).then(|| CapacityExceeded {
        office_id: signature.office_id.clone(),
        capacity: seats.len(),
        requested,
    });

    BuildingLayout {
        office_id: signature.office_id.clone(),
        signature,
        template: Arc::clone(template),
        placements,
        unseated,
        capacity,
    }
}

/// Layout computations vs. cache reuses since creation
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResolverStats {
    pub computed: u64,
    pub reused: u64,
}

/// Resolves and caches one building layout per office
pub struct LayoutResolver {
    templates: Arc<TemplateSet>,
    policy: OverflowPolicy,

    /// Office id -> layout for the last resolved roster
    cache: HashMap<OfficeId, Arc<BuildingLayout>>,

    stats: ResolverStats,
}

impl LayoutResolver {
    pub fn new(templates: Arc<TemplateSet>, policy: OverflowPolicy) -> Self {
        Self {
            templates,
            policy,
            cache: HashMap::new(),
            stats: ResolverStats::default(),
        }
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// Layout for an office and roster.
    ///
    /// Reuses the cached layout when the roster signature is unchanged,
    /// whatever the order of `agent_ids`. Fails with `UnknownOffice` when no
    /// template (and no fallback) covers the office.
    pub fn resolve<I, S>(
        &mut self,
        office_id: &str,
        agent_ids: I,
    ) -> Result<Arc<BuildingLayout>, LayoutError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let template = self
            .templates
            .get(office_id)
            .ok_or_else(|| LayoutError::UnknownOffice(office_id.to_string()))?;

        let signature = RosterSignature::new(office_id, agent_ids);

        if let Some(cached) = self.cache.get(office_id) {
            if cached.signature == signature {
                self.stats.reused += 1;
                return Ok(Arc::clone(cached));
            }
        }

        let layout = Arc::new(compute_layout(template, signature, self.policy));
        self.stats.computed += 1;

        debug!(
            office_id = %office_id,
            agents = layout.members().len(),
            digest = layout.signature.digest,
            "Computed building layout"
        );

        self.cache.insert(office_id.to_string(), Arc::clone(&layout));
        Ok(layout)
    }

    /// Cached layout for an office, if any
    pub fn cached(&self, office_id: &str) -> Option<Arc<BuildingLayout>> {
        self.cache.get(office_id).cloned()
    }

    /// Drop cache entries of offices not in `live`
    pub fn retain<'a, I>(&mut self, live: I)
    where
        I: IntoIterator<Item = &'a OfficeId>,
    {
        let live: HashSet<&OfficeId> = live.into_iter().collect();
        self.cache.retain(|office_id, _| live.contains(office_id));
    }

    pub fn stats(&self) -> ResolverStats {
        self.stats
    }
}

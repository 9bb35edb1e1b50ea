//! Trust Network
//!
//! The shared, undirected graph of pairwise trust between agents. Each edge
//! carries four trust dimensions that decay at their own rates, a volatility
//! estimate and a capped interaction log. Salient events ripple outward to
//! nearby agents with diminishing strength.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use trader_events::{AgentId, SimTime};

use crate::config::TrustTuning;
use crate::error::{CoreError, Result};

/// Trust returned for pairs that never interacted
pub const NEUTRAL_TRUST: f64 = 50.0;

/// Four-dimensional trust (each 0 to 100 on edges; also reused for weights
/// and decay rates)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrustDimensions {
    /// Can they deliver?
    pub competence: f64,
    /// Do they mean well?
    pub benevolence: f64,
    /// Do they keep their word?
    pub integrity: f64,
    /// Do they behave consistently?
    pub predictability: f64,
}

impl TrustDimensions {
    pub const fn new(competence: f64, benevolence: f64, integrity: f64, predictability: f64) -> Self {
        Self {
            competence,
            benevolence,
            integrity,
            predictability,
        }
    }

    pub const fn uniform(value: f64) -> Self {
        Self::new(value, value, value, value)
    }

    /// Weighted blend with the given weights.
    pub fn weighted(&self, weights: &TrustDimensions) -> f64 {
        self.competence * weights.competence
            + self.benevolence * weights.benevolence
            + self.integrity * weights.integrity
            + self.predictability * weights.predictability
    }

    fn zip_with(&self, other: &TrustDimensions, f: impl Fn(f64, f64) -> f64) -> Self {
        Self::new(
            f(self.competence, other.competence),
            f(self.benevolence, other.benevolence),
            f(self.integrity, other.integrity),
            f(self.predictability, other.predictability),
        )
    }

    fn scaled(&self, factor: f64) -> Self {
        Self::new(
            self.competence * factor,
            self.benevolence * factor,
            self.integrity * factor,
            self.predictability * factor,
        )
    }

    fn clamped(&self) -> Self {
        Self::new(
            self.competence.clamp(0.0, 100.0),
            self.benevolence.clamp(0.0, 100.0),
            self.integrity.clamp(0.0, 100.0),
            self.predictability.clamp(0.0, 100.0),
        )
    }

    /// Fails unless every dimension lies in [0, 100].
    pub fn validate(&self) -> Result<()> {
        CoreError::check_bounds("competence", self.competence, 0.0, 100.0)?;
        CoreError::check_bounds("benevolence", self.benevolence, 0.0, 100.0)?;
        CoreError::check_bounds("integrity", self.integrity, 0.0, 100.0)?;
        CoreError::check_bounds("predictability", self.predictability, 0.0, 100.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> {
        [self.competence, self.benevolence, self.integrity, self.predictability].into_iter()
    }
}

/// Kinds of interaction the network understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    SuccessfulTrade,
    FailedTrade,
    Betrayal,
    Cooperation,
    MissedDeadline,
    PromiseKept,
}

impl InteractionKind {
    /// Dimension deltas at magnitude 100.
    pub fn impact(self) -> TrustDimensions {
        match self {
            InteractionKind::SuccessfulTrade => TrustDimensions::new(4.0, 1.0, 2.0, 3.0),
            InteractionKind::FailedTrade => TrustDimensions::new(-4.0, 0.0, -1.0, -3.0),
            InteractionKind::Betrayal => TrustDimensions::new(-15.0, -50.0, -65.0, -40.0),
            InteractionKind::Cooperation => TrustDimensions::new(3.0, 8.0, 4.0, 3.0),
            InteractionKind::MissedDeadline => TrustDimensions::new(-3.0, 0.0, -2.0, -12.0),
            InteractionKind::PromiseKept => TrustDimensions::new(0.0, 2.0, 5.0, 6.0),
        }
    }

    /// How far news of this interaction travels.
    pub fn propagation_strength(self) -> f64 {
        match self {
            InteractionKind::Betrayal => 0.4,
            InteractionKind::Cooperation => 0.15,
            InteractionKind::MissedDeadline => 0.1,
            InteractionKind::SuccessfulTrade
            | InteractionKind::FailedTrade
            | InteractionKind::PromiseKept => 0.05,
        }
    }

    pub fn is_bad_news(self) -> bool {
        self.impact().iter().sum::<f64>() < 0.0
    }

    pub fn as_str(self) -> &'static str {
        match self {
            InteractionKind::SuccessfulTrade => "successful_trade",
            InteractionKind::FailedTrade => "failed_trade",
            InteractionKind::Betrayal => "betrayal",
            InteractionKind::Cooperation => "cooperation",
            InteractionKind::MissedDeadline => "missed_deadline",
            InteractionKind::PromiseKept => "promise_kept",
        }
    }
}

/// One observed interaction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub kind: InteractionKind,
    /// 0 to 100
    pub magnitude: f64,
}

impl Interaction {
    pub fn new(kind: InteractionKind, magnitude: f64) -> Self {
        Self { kind, magnitude }
    }

    pub fn validate(&self) -> Result<()> {
        CoreError::check_bounds("magnitude", self.magnitude, 0.0, 100.0)
    }
}

/// Entry of an edge's interaction log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub actor: AgentId,
    pub kind: InteractionKind,
    pub magnitude: f64,
    pub at: SimTime,
    /// Change of scalar trust caused by this interaction
    pub trust_delta: f64,
}

/// Undirected trust edge between `low` and `high` (canonical order)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustEdge {
    pub low: AgentId,
    pub high: AgentId,
    /// Dimensions as of `decayed_at`
    pub dimensions: TrustDimensions,
    /// EMA of normalised trust swings; accelerates decay
    pub volatility: f64,
    pub interactions: u64,
    pub log: VecDeque<InteractionRecord>,
    pub context: Option<String>,
    pub created_at: SimTime,
    pub last_interaction: SimTime,
    pub decayed_at: SimTime,
}

impl TrustEdge {
    fn new(low: AgentId, high: AgentId, initial: TrustDimensions, context: Option<String>, now: SimTime) -> Self {
        Self {
            low,
            high,
            dimensions: initial,
            volatility: 0.0,
            interactions: 0,
            log: VecDeque::new(),
            context,
            created_at: now,
            last_interaction: now,
            decayed_at: now,
        }
    }

    /// Dimensions with idle decay up to `now` applied, without mutating.
    pub fn dimensions_at(&self, now: SimTime, tuning: &TrustTuning, ticks_per_day: u64) -> TrustDimensions {
        let days = now.days_since(self.decayed_at, ticks_per_day);
        if days <= 0.0 {
            return self.dimensions;
        }
        let volatility = self.volatility;
        self.dimensions
            .zip_with(&tuning.decay_per_day, |value, rate| {
                let daily = (1.0 - rate * (1.0 + volatility)).max(0.0);
                value * daily.powf(days)
            })
            .clamped()
    }

    fn fold_decay(&mut self, now: SimTime, tuning: &TrustTuning, ticks_per_day: u64) {
        if now > self.decayed_at {
            self.dimensions = self.dimensions_at(now, tuning, ticks_per_day);
            self.decayed_at = now;
        }
    }

    pub fn other(&self, id: &AgentId) -> &AgentId {
        if &self.low == id {
            &self.high
        } else {
            &self.low
        }
    }
}

/// An indirect adjustment made by propagation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustAdjustment {
    pub observer: AgentId,
    pub actor: AgentId,
    pub hop: usize,
    pub before: f64,
    pub after: f64,
}

fn canonical(a: &AgentId, b: &AgentId) -> (AgentId, AgentId) {
    if a <= b {
        (a.clone(), b.clone())
    } else {
        (b.clone(), a.clone())
    }
}

/// Shared trust graph. Owns its own clock; decay is folded into an edge
/// lazily whenever it is touched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustNetwork {
    /// Edges keyed by the lower id, then the higher id
    edges: BTreeMap<AgentId, BTreeMap<AgentId, TrustEdge>>,
    now: SimTime,
    ticks_per_day: u64,
    tuning: TrustTuning,
}

impl TrustNetwork {
    pub fn new(tuning: TrustTuning, ticks_per_day: u64) -> Self {
        Self {
            edges: BTreeMap::new(),
            now: SimTime::ZERO,
            ticks_per_day: ticks_per_day.max(1),
            tuning,
        }
    }

    pub fn now(&self) -> SimTime {
        self.now
    }

    pub fn tuning(&self) -> &TrustTuning {
        &self.tuning
    }

    /// Moves the clock forward. Never moves it backwards.
    pub fn advance_to(&mut self, now: SimTime) {
        if now > self.now {
            self.now = now;
        }
    }

    pub fn edge(&self, a: &AgentId, b: &AgentId) -> Option<&TrustEdge> {
        let (low, high) = canonical(a, b);
        self.edges.get(&low).and_then(|inner| inner.get(&high))
    }

    fn edge_mut(&mut self, a: &AgentId, b: &AgentId) -> Option<&mut TrustEdge> {
        let (low, high) = canonical(a, b);
        self.edges.get_mut(&low).and_then(|inner| inner.get_mut(&high))
    }

    pub fn edge_count(&self) -> usize {
        self.edges.values().map(BTreeMap::len).sum()
    }

    pub fn edges(&self) -> impl Iterator<Item = &TrustEdge> {
        self.edges.values().flat_map(|inner| inner.values())
    }

    /// Every node with at least one edge, in id order.
    pub fn nodes(&self) -> BTreeSet<AgentId> {
        self.edges()
            .flat_map(|edge| [edge.low.clone(), edge.high.clone()])
            .collect()
    }

    /// Neighbours of `id` in id order.
    pub fn neighbors(&self, id: &AgentId) -> Vec<AgentId> {
        let mut out: BTreeSet<AgentId> = BTreeSet::new();
        if let Some(inner) = self.edges.get(id) {
            out.extend(inner.keys().cloned());
        }
        for (low, inner) in &self.edges {
            if inner.contains_key(id) {
                out.insert(low.clone());
            }
        }
        out.into_iter().collect()
    }

    /// Creates an edge if absent. Returns whether it was created.
    pub fn connect(&mut self, a: &AgentId, b: &AgentId, initial: TrustDimensions, context: Option<&str>) -> Result<bool> {
        if a == b {
            return Err(CoreError::SelfInteraction(a.clone()));
        }
        initial.validate()?;
        if self.edge(a, b).is_some() {
            return Ok(false);
        }
        let (low, high) = canonical(a, b);
        let edge = TrustEdge::new(low.clone(), high.clone(), initial, context.map(str::to_string), self.now);
        self.edges.entry(low).or_default().insert(high, edge);
        Ok(true)
    }

    /// Scalar trust between two agents after decay; neutral for strangers.
    pub fn trust(&self, a: &AgentId, b: &AgentId) -> f64 {
        match self.edge(a, b) {
            Some(edge) => edge
                .dimensions_at(self.now, &self.tuning, self.ticks_per_day)
                .weighted(&self.tuning.weights),
            None => NEUTRAL_TRUST,
        }
    }

    /// Decayed dimensions of an edge, if it exists.
    pub fn dimensions(&self, a: &AgentId, b: &AgentId) -> Option<TrustDimensions> {
        self.edge(a, b)
            .map(|edge| edge.dimensions_at(self.now, &self.tuning, self.ticks_per_day))
    }

    /// Applies an interaction by `actor` as experienced by `witness` to their
    /// edge, creating a neutral edge if needed. Returns the scalar change.
    pub fn observe(&mut self, actor: &AgentId, witness: &AgentId, interaction: Interaction) -> Result<f64> {
        if actor == witness {
            return Err(CoreError::SelfInteraction(actor.clone()));
        }
        interaction.validate()?;
        if self.edge(actor, witness).is_none() {
            self.connect(actor, witness, TrustDimensions::uniform(NEUTRAL_TRUST), None)?;
        }

        let now = self.now;
        let ticks_per_day = self.ticks_per_day;
        let tuning = self.tuning.clone();
        let delta = interaction.kind.impact().scaled(interaction.magnitude / 100.0);

        let edge = match self.edge_mut(actor, witness) {
            Some(edge) => edge,
            None => return Ok(0.0),
        };
        let change = apply_delta(edge, actor, delta, interaction, now, &tuning, ticks_per_day);
        edge.interactions += 1;
        edge.last_interaction = now;
        Ok(change)
    }

    /// Spreads news of an interaction outward from the witness.
    ///
    /// Breadth-first over the witness's neighbourhood up to `max_hops`,
    /// never visiting the actor. Each observer's existing edge to the actor
    /// moves by the interaction's impact scaled by hop distance, the kind's
    /// strength, and how much the observer trusts whoever told them.
    pub fn propagate(&mut self, actor: &AgentId, witness: &AgentId, interaction: Interaction) -> Result<Vec<TrustAdjustment>> {
        if actor == witness {
            return Err(CoreError::SelfInteraction(actor.clone()));
        }
        interaction.validate()?;

        // Collect (observer, informant, hop) first so adjustments never
        // influence credibility within the same wave.
        let mut visited: BTreeSet<AgentId> = BTreeSet::new();
        visited.insert(actor.clone());
        visited.insert(witness.clone());
        let mut frontier = vec![witness.clone()];
        let mut plan: Vec<(AgentId, f64, usize)> = Vec::new();

        for hop in 1..=self.tuning.max_hops {
            let mut next = Vec::new();
            for informant in &frontier {
                for observer in self.neighbors(informant) {
                    if visited.contains(&observer) {
                        continue;
                    }
                    visited.insert(observer.clone());
                    let credibility = self.trust(&observer, informant) / 100.0;
                    plan.push((observer.clone(), credibility, hop));
                    next.push(observer);
                }
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }

        let bad_news = interaction.kind.is_bad_news();
        let base = interaction.kind.impact().scaled(
            interaction.kind.propagation_strength() * interaction.magnitude / 100.0,
        );
        let now = self.now;
        let ticks_per_day = self.ticks_per_day;
        let tuning = self.tuning.clone();
        let mut adjustments = Vec::new();

        for (observer, credibility, hop) in plan {
            if self.edge(&observer, actor).is_none() {
                continue;
            }
            let before = self.trust(&observer, actor);
            if bad_news && before < tuning.distrust_gate {
                continue;
            }
            let factor = tuning.decay_per_hop.powi(hop as i32) * credibility;
            if factor <= 0.0 {
                continue;
            }
            if let Some(edge) = self.edge_mut(&observer, actor) {
                apply_delta(edge, actor, base.scaled(factor), interaction, now, &tuning, ticks_per_day);
            }
            let after = self.trust(&observer, actor);
            adjustments.push(TrustAdjustment {
                observer,
                actor: actor.clone(),
                hop,
                before,
                after,
            });
        }

        if !adjustments.is_empty() {
            tracing::debug!(
                actor = %actor,
                kind = interaction.kind.as_str(),
                reached = adjustments.len(),
                "Trust news propagated"
            );
        }
        Ok(adjustments)
    }

    /// Greedy clusters over edges whose trust reaches the community
    /// threshold. Members and clusters are sorted; singletons are dropped.
    pub fn communities(&self) -> Vec<Vec<AgentId>> {
        let threshold = self.tuning.community_threshold;
        let mut strong: BTreeMap<AgentId, BTreeSet<AgentId>> = BTreeMap::new();
        for edge in self.edges() {
            if self.trust(&edge.low, &edge.high) >= threshold {
                strong.entry(edge.low.clone()).or_default().insert(edge.high.clone());
                strong.entry(edge.high.clone()).or_default().insert(edge.low.clone());
            }
        }

        let mut seen: BTreeSet<AgentId> = BTreeSet::new();
        let mut clusters = Vec::new();
        for start in strong.keys() {
            if seen.contains(start) {
                continue;
            }
            let mut cluster = BTreeSet::new();
            let mut queue = VecDeque::from([start.clone()]);
            seen.insert(start.clone());
            while let Some(node) = queue.pop_front() {
                if let Some(next) = strong.get(&node) {
                    for neighbor in next {
                        if seen.insert(neighbor.clone()) {
                            queue.push_back(neighbor.clone());
                        }
                    }
                }
                cluster.insert(node);
            }
            if cluster.len() >= 2 {
                clusters.push(cluster.into_iter().collect::<Vec<_>>());
            }
        }
        clusters.sort();
        clusters
    }

    /// Advances the clock by `ticks`, folds decay into every edge and prunes
    /// weak edges with little history. Returns the pruned pairs.
    pub fn evolve(&mut self, ticks: u64) -> Vec<(AgentId, AgentId)> {
        self.now = self.now.advance(ticks);
        let now = self.now;
        let ticks_per_day = self.ticks_per_day;
        let tuning = self.tuning.clone();

        let mut pruned = Vec::new();
        for inner in self.edges.values_mut() {
            inner.retain(|_, edge| {
                edge.fold_decay(now, &tuning, ticks_per_day);
                let weak = edge.dimensions.weighted(&tuning.weights) < tuning.prune_below
                    && (edge.interactions as usize) < tuning.prune_min_interactions;
                if weak {
                    pruned.push((edge.low.clone(), edge.high.clone()));
                }
                !weak
            });
        }
        self.edges.retain(|_, inner| !inner.is_empty());

        for (low, high) in &pruned {
            tracing::debug!(low = %low, high = %high, "Pruned weak trust edge");
        }
        pruned
    }

    /// Removes every edge touching `id`.
    pub fn remove_node(&mut self, id: &AgentId) {
        self.edges.remove(id);
        for inner in self.edges.values_mut() {
            inner.remove(id);
        }
        self.edges.retain(|_, inner| !inner.is_empty());
    }
}

fn apply_delta(
    edge: &mut TrustEdge,
    actor: &AgentId,
    delta: TrustDimensions,
    interaction: Interaction,
    now: SimTime,
    tuning: &TrustTuning,
    ticks_per_day: u64,
) -> f64 {
    edge.fold_decay(now, tuning, ticks_per_day);
    let before = edge.dimensions.weighted(&tuning.weights);
    edge.dimensions = edge.dimensions.zip_with(&delta, |v, d| v + d).clamped();
    let after = edge.dimensions.weighted(&tuning.weights);
    let change = after - before;

    let alpha = tuning.volatility_alpha.clamp(0.0, 1.0);
    edge.volatility = (1.0 - alpha) * edge.volatility + alpha * (change.abs() / 100.0);

    edge.log.push_back(InteractionRecord {
        actor: actor.clone(),
        kind: interaction.kind,
        magnitude: interaction.magnitude,
        at: now,
        trust_delta: change,
    });
    while edge.log.len() > tuning.log_capacity {
        edge.log.pop_front();
    }
    change
}

//! Experience Memory
//!
//! Typed, append-only records with relevance-ranked recall, retention-based
//! pruning and consolidation of repetitive experiences into summaries.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use trader_events::{AgentId, MarketSnapshot, Opportunity, OpportunityType, SimTime};

use crate::components::strategy::MarketRegime;
use crate::config::MemoryTuning;
use crate::error::{CoreError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    Trade,
    Betrayal,
    Partnership,
    Milestone,
    Init,
}

impl MemoryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MemoryKind::Trade => "trade",
            MemoryKind::Betrayal => "betrayal",
            MemoryKind::Partnership => "partnership",
            MemoryKind::Milestone => "milestone",
            MemoryKind::Init => "init",
        }
    }
}

impl fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate carried by a consolidated record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemorySummary {
    pub count: usize,
    pub total_profit_loss: f64,
    pub mean_impact: f64,
    pub first_at: SimTime,
    pub last_at: SimTime,
}

/// What a memory is about
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counterparty: Option<AgentId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opportunity_type: Option<OpportunityType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regime: Option<MarketRegime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profit_loss: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<MemorySummary>,
}

impl MemoryPayload {
    pub fn with_counterparty(mut self, counterparty: AgentId) -> Self {
        self.counterparty = Some(counterparty);
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Payload describing a stimulus.
    pub fn for_stimulus(opportunity: &Opportunity, market: &MarketSnapshot) -> Self {
        Self {
            counterparty: opportunity.counterparty.clone(),
            asset: opportunity.asset.clone(),
            opportunity_type: Some(opportunity.opportunity_type),
            regime: Some(MarketRegime::classify(market)),
            ..Self::default()
        }
    }

    fn tags(&self, kind: MemoryKind) -> BTreeSet<String> {
        let mut tags = BTreeSet::new();
        tags.insert(format!("kind:{}", kind));
        if let Some(cp) = &self.counterparty {
            tags.insert(counterparty_tag(cp));
        }
        if let Some(asset) = &self.asset {
            tags.insert(format!("asset:{}", asset));
        }
        if let Some(ot) = self.opportunity_type {
            tags.insert(format!("opportunity:{}", ot));
        }
        if let Some(regime) = self.regime {
            tags.insert(format!("regime:{}", regime.as_str()));
        }
        tags
    }
}

pub fn counterparty_tag(id: &AgentId) -> String {
    format!("counterparty:{}", id)
}

/// A stored memory. Content never changes after it is written; only the
/// crystallized and consolidated markers are set later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryRecord {
    pub id: u64,
    pub kind: MemoryKind,
    pub timestamp: SimTime,
    /// 0 to 100
    pub emotional_impact: f64,
    pub tags: BTreeSet<String>,
    pub payload: MemoryPayload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome_tag: Option<String>,
    #[serde(default)]
    pub crystallized: bool,
    /// Summary this record was folded into
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consolidated_into: Option<u64>,
}

impl MemoryRecord {
    pub fn involves(&self, counterparty: &AgentId) -> bool {
        self.payload.counterparty.as_ref() == Some(counterparty)
    }
}

/// Recall request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryQuery {
    pub tags: BTreeSet<String>,
}

impl MemoryQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Query matching the opportunity, its counterparty and the market regime.
    pub fn for_stimulus(opportunity: &Opportunity, market: &MarketSnapshot) -> Self {
        let mut tags = MemoryPayload::for_stimulus(opportunity, market).tags(MemoryKind::Trade);
        tags.remove("kind:trade");
        Self { tags }
    }
}

/// Parameters that govern scoring and retention
#[derive(Debug, Clone, Copy)]
pub struct RetentionPolicy<'a> {
    pub tuning: &'a MemoryTuning,
    pub retention_days: u64,
    pub ticks_per_day: u64,
}

impl<'a> RetentionPolicy<'a> {
    pub fn new(tuning: &'a MemoryTuning, retention_days: u64, ticks_per_day: u64) -> Self {
        Self {
            tuning,
            retention_days,
            ticks_per_day: ticks_per_day.max(1),
        }
    }

    fn age_days(&self, record: &MemoryRecord, now: SimTime) -> f64 {
        now.days_since(record.timestamp, self.ticks_per_day)
    }

    /// α·overlap + β·recency − γ·staleness + δ·impact
    pub fn score(&self, record: &MemoryRecord, query: &MemoryQuery, now: SimTime) -> f64 {
        let t = self.tuning;
        let overlap = query.tags.intersection(&record.tags).count() as f64;
        let age = self.age_days(record, now);
        let recency = 0.5f64.powf(age / t.recency_half_life_days.max(f64::MIN_POSITIVE));
        let stale = (age - self.retention_days as f64).max(0.0);
        t.tag_weight * overlap + t.recency_weight * recency - t.staleness_weight * stale
            + t.impact_weight * record.emotional_impact
    }
}

/// One recalled record with its score
#[derive(Debug, Clone, PartialEq)]
pub struct Recalled<'a> {
    pub score: f64,
    pub record: &'a MemoryRecord,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PruneReport {
    pub removed: usize,
    pub newly_crystallized: usize,
}

/// Capped store of memory records, ordered by id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryStore {
    records: Vec<MemoryRecord>,
    next_id: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    pub fn records(&self) -> &[MemoryRecord] {
        &self.records
    }

    pub fn get(&self, id: u64) -> Option<&MemoryRecord> {
        self.records
            .binary_search_by_key(&id, |r| r.id)
            .ok()
            .map(|i| &self.records[i])
    }

    pub fn crystallized_count(&self) -> usize {
        self.records.iter().filter(|r| r.crystallized).count()
    }

    /// Betrayal records naming `counterparty`, oldest first.
    pub fn betrayals_by<'a>(&'a self, counterparty: &'a AgentId) -> impl Iterator<Item = &'a MemoryRecord> + 'a {
        self.records
            .iter()
            .filter(move |r| r.kind == MemoryKind::Betrayal && r.involves(counterparty))
    }

    /// Appends a record and returns its id. Never refuses: at capacity the
    /// lowest-scoring ordinary record makes room.
    pub fn record(
        &mut self,
        kind: MemoryKind,
        payload: MemoryPayload,
        outcome_tag: Option<String>,
        emotional_impact: f64,
        now: SimTime,
        policy: RetentionPolicy<'_>,
    ) -> Result<u64> {
        CoreError::check_bounds("emotional_impact", emotional_impact, 0.0, 100.0)?;
        let tuning = policy.tuning;
        let crystallized = emotional_impact >= tuning.crystallize_threshold
            && self.crystallized_count() < tuning.crystallized_cap();

        while self.records.len() >= tuning.capacity.max(1) {
            if !self.evict_one(now, policy) {
                break;
            }
        }

        let id = self.next_id;
        self.next_id += 1;
        let tags = payload.tags(kind);
        self.records.push(MemoryRecord {
            id,
            kind,
            timestamp: now,
            emotional_impact,
            tags,
            payload,
            outcome_tag,
            crystallized,
            consolidated_into: None,
        });
        Ok(id)
    }

    fn evict_one(&mut self, now: SimTime, policy: RetentionPolicy<'_>) -> bool {
        let query = MemoryQuery::new();
        let victim = self
            .records
            .iter()
            .enumerate()
            .filter(|(_, r)| !r.crystallized)
            .min_by(|(_, a), (_, b)| {
                policy
                    .score(a, &query, now)
                    .total_cmp(&policy.score(b, &query, now))
                    .then(a.id.cmp(&b.id))
            })
            .map(|(i, _)| i);
        match victim {
            Some(index) => {
                self.records.remove(index);
                true
            }
            None => false,
        }
    }

    /// Records a betrayal by `counterparty`.
    pub fn betrayal(
        &mut self,
        counterparty: &AgentId,
        betrayal_kind: &str,
        context: Option<&str>,
        damage: f64,
        now: SimTime,
        policy: RetentionPolicy<'_>,
    ) -> Result<u64> {
        let detail = match context {
            Some(ctx) => format!("{} ({})", betrayal_kind, ctx),
            None => betrayal_kind.to_string(),
        };
        let payload = MemoryPayload::default()
            .with_counterparty(counterparty.clone())
            .with_detail(detail);
        self.record(
            MemoryKind::Betrayal,
            payload,
            Some("betrayal".to_string()),
            damage.clamp(0.0, 100.0),
            now,
            policy,
        )
    }

    /// Records a successful collaboration with `counterparty`.
    pub fn partnership(
        &mut self,
        counterparty: &AgentId,
        collaboration: &str,
        benefit: f64,
        now: SimTime,
        policy: RetentionPolicy<'_>,
    ) -> Result<u64> {
        let payload = MemoryPayload::default()
            .with_counterparty(counterparty.clone())
            .with_detail(collaboration);
        self.record(
            MemoryKind::Partnership,
            payload,
            Some("partnership".to_string()),
            benefit.clamp(0.0, 100.0),
            now,
            policy,
        )
    }

    /// Top-K records by relevance. Ties go to the newer record.
    pub fn recall(&self, query: &MemoryQuery, now: SimTime, policy: RetentionPolicy<'_>) -> Vec<Recalled<'_>> {
        let mut scored: Vec<Recalled<'_>> = self
            .records
            .iter()
            .filter(|r| r.consolidated_into.is_none())
            .map(|record| Recalled {
                score: policy.score(record, query, now),
                record,
            })
            .collect();
        scored.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then(b.record.timestamp.cmp(&a.record.timestamp))
                .then(b.record.id.cmp(&a.record.id))
        });
        scored.truncate(policy.tuning.recall_top_k);
        scored
    }

    /// Crystallizes high-impact records (up to the cap) and drops stale,
    /// low-impact ones. Crystallized records are never removed.
    pub fn decay_and_prune(&mut self, now: SimTime, policy: RetentionPolicy<'_>) -> PruneReport {
        let tuning = policy.tuning;
        let mut report = PruneReport::default();

        let mut room = tuning.crystallized_cap().saturating_sub(self.crystallized_count());
        if room > 0 {
            let mut candidates: Vec<usize> = self
                .records
                .iter()
                .enumerate()
                .filter(|(_, r)| !r.crystallized && r.emotional_impact >= tuning.crystallize_threshold)
                .map(|(i, _)| i)
                .collect();
            candidates.sort_by(|&a, &b| {
                let (ra, rb) = (&self.records[a], &self.records[b]);
                rb.emotional_impact
                    .total_cmp(&ra.emotional_impact)
                    .then(rb.id.cmp(&ra.id))
            });
            for index in candidates {
                if room == 0 {
                    break;
                }
                self.records[index].crystallized = true;
                room -= 1;
                report.newly_crystallized += 1;
            }
        }

        let retention = policy.retention_days as f64;
        let before = self.records.len();
        self.records.retain(|r| {
            r.crystallized
                || !(policy.age_days(r, now) > retention && r.emotional_impact < tuning.prune_impact_threshold)
        });
        report.removed = before - self.records.len();
        report
    }

    /// Folds clusters of similar records (same kind and tags, within the
    /// consolidation window) into summary records and removes the originals.
    /// Crystallized records never take part. Returns the new summary ids.
    pub fn consolidate(&mut self, now: SimTime, policy: RetentionPolicy<'_>) -> Vec<u64> {
        let tuning = policy.tuning;
        let window = SimTime::days_to_ticks(tuning.consolidation_window_days, policy.ticks_per_day);
        let min_cluster = tuning.consolidation_min_cluster.max(2);

        let mut groups: BTreeMap<(MemoryKind, Vec<String>), Vec<usize>> = BTreeMap::new();
        for (index, record) in self.records.iter().enumerate() {
            if record.crystallized || record.payload.summary.is_some() || record.consolidated_into.is_some() {
                continue;
            }
            let key = (record.kind, record.tags.iter().cloned().collect::<Vec<_>>());
            groups.entry(key).or_default().push(index);
        }

        let mut clusters: Vec<Vec<usize>> = Vec::new();
        for (_, mut members) in groups {
            members.sort_by_key(|&i| (self.records[i].timestamp, self.records[i].id));
            let mut start = 0;
            while start < members.len() {
                let anchor = self.records[members[start]].timestamp;
                let mut end = start;
                while end < members.len() && self.records[members[end]].timestamp.ticks_since(anchor) <= window {
                    end += 1;
                }
                if end - start >= min_cluster {
                    clusters.push(members[start..end].to_vec());
                    start = end;
                } else {
                    start += 1;
                }
            }
        }
        clusters.sort_by_key(|c| c.first().map(|&i| self.records[i].id));

        let mut summaries = Vec::new();
        let mut folded: BTreeSet<usize> = BTreeSet::new();
        for cluster in clusters {
            let first = &self.records[cluster[0]];
            let id = self.next_id;
            self.next_id += 1;

            let count = cluster.len();
            let total_pl: f64 = cluster
                .iter()
                .filter_map(|&i| self.records[i].payload.profit_loss)
                .sum();
            let impacts: Vec<f64> = cluster.iter().map(|&i| self.records[i].emotional_impact).collect();
            let mean_impact = impacts.iter().sum::<f64>() / count as f64;
            let max_impact = impacts.iter().copied().fold(0.0, f64::max);
            let first_at = first.timestamp;
            let last_at = cluster
                .iter()
                .map(|&i| self.records[i].timestamp)
                .max()
                .unwrap_or(first_at);

            let payload = MemoryPayload {
                profit_loss: Some(total_pl),
                detail: Some(format!("{} similar {} memories", count, first.kind)),
                summary: Some(MemorySummary {
                    count,
                    total_profit_loss: total_pl,
                    mean_impact,
                    first_at,
                    last_at,
                }),
                ..first.payload.clone()
            };
            let summary = MemoryRecord {
                id,
                kind: first.kind,
                timestamp: last_at,
                emotional_impact: max_impact,
                tags: first.tags.clone(),
                payload,
                outcome_tag: Some("consolidated".to_string()),
                crystallized: false,
                consolidated_into: None,
            };

            for &index in &cluster {
                self.records[index].consolidated_into = Some(id);
                folded.insert(index);
            }
            self.records.push(summary);
            summaries.push(id);
        }

        if !summaries.is_empty() {
            let mut index = 0;
            self.records.retain(|r| {
                let keep = !folded.contains(&index);
                index += 1;
                keep
            });
            while self.records.len() > tuning.capacity.max(1) {
                if !self.evict_one(now, policy) {
                    break;
                }
            }
            tracing::debug!(summaries = summaries.len(), folded = folded.len(), at = %now, "Consolidated memories");
        }
        summaries
    }
}

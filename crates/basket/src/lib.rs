// Rust guideline compliant 2026-10-12

//! Market-basket analysis.
//!
//! [`RuleSet::mine`] runs level-wise Apriori over the snapshot's baskets and
//! derives single-consequent association rules (support / confidence / lift).
//! [`RuleSet::score_basket`] fires every rule whose antecedent is contained in
//! a query basket and scores each consequent by its strongest rule
//! (`confidence * lift`).
//!
//! Support counting is parallel over baskets. Counts are integers merged by
//! addition, so the mined rule set depends only on the thresholds, never on
//! basket or enumeration order.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use domain::{AssociationRule, Basket, CandidateSet, EngineConfig, ProductId, Strategy};
use rayon::prelude::*;

/// Itemset over dense product indices, sorted ascending.
type Itemset = Vec<u32>;

// ---------------------------------------------------------------------------
// RuleSet
// ---------------------------------------------------------------------------

/// All association rules for one snapshot. Rebuilt wholesale on refresh.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    /// Sorted by `(antecedent, consequent)`.
    rules: Vec<AssociationRule>,
    /// Rule indices keyed by the smallest antecedent item.
    by_first_item: HashMap<ProductId, Vec<usize>>,
}

impl RuleSet {
    /// Wrap precomputed rules, sorting and indexing them.
    #[must_use]
    pub fn from_rules(mut rules: Vec<AssociationRule>) -> Self {
        rules.sort_by(|a, b| {
            a.antecedent.cmp(&b.antecedent).then_with(|| a.consequent.cmp(&b.consequent))
        });
        let mut by_first_item: HashMap<ProductId, Vec<usize>> = HashMap::new();
        for (i, rule) in rules.iter().enumerate() {
            if let Some(first) = rule.antecedent.iter().min() {
                by_first_item.entry(first.clone()).or_default().push(i);
            }
        }
        Self { rules, by_first_item }
    }

    /// Mine frequent itemsets from `baskets` and derive rules above the
    /// configured support and confidence thresholds.
    #[must_use]
    pub fn mine(baskets: &[Basket], config: &EngineConfig) -> Self {
        let n = baskets.len();
        if n == 0 {
            return Self::default();
        }

        // Dense indices follow ProductId order, so sorted itemsets sort like their ids.
        let universe: Vec<ProductId> = baskets
            .iter()
            .flat_map(|b| b.items.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let index: HashMap<&ProductId, u32> = universe
            .iter()
            .enumerate()
            .filter_map(|(i, p)| Some((p, u32::try_from(i).ok()?)))
            .collect();
        let transactions: Vec<Itemset> = baskets
            .iter()
            .map(|b| {
                let items: BTreeSet<u32> =
                    b.items.iter().filter_map(|p| index.get(p).copied()).collect();
                items.into_iter().collect()
            })
            .collect();

        #[expect(clippy::cast_precision_loss, reason = "basket counts are far below 2^52")]
        let frequent = |count: usize| count > 0 && count as f64 / n as f64 >= config.min_support;

        let mut supports: HashMap<Itemset, usize> = HashMap::new();
        let mut singles: HashMap<u32, usize> = HashMap::new();
        for t in &transactions {
            for &item in t {
                *singles.entry(item).or_default() += 1;
            }
        }
        let mut level: Vec<Itemset> = singles
            .into_iter()
            .filter(|&(_, count)| frequent(count))
            .map(|(item, count)| {
                supports.insert(vec![item], count);
                vec![item]
            })
            .collect();
        level.sort_unstable();

        for size in 2..=config.max_itemset_len {
            let candidates = candidate_itemsets(&level);
            if candidates.is_empty() {
                break;
            }
            let counts = count_candidates(&transactions, &candidates, size);
            level = counts
                .into_iter()
                .filter(|&(_, count)| frequent(count))
                .map(|(itemset, count)| {
                    supports.insert(itemset.clone(), count);
                    itemset
                })
                .collect();
            level.sort_unstable();
            tracing::debug!("basket.mine.level: size={size} frequent={}", level.len());
        }

        let rules = derive_rules(&supports, &universe, n, config.min_confidence);
        tracing::info!(
            "basket.mine.done: baskets={n} itemsets={} rules={}",
            supports.len(),
            rules.len()
        );
        Self::from_rules(rules)
    }

    /// Score consequents for a query basket.
    ///
    /// `score(p) = max(confidence * lift)` over rules with antecedent contained
    /// in the basket and consequent `p` not in it. Fewer than two distinct
    /// items yields an empty cold-start set.
    #[must_use]
    pub fn score_basket(&self, basket: &[ProductId]) -> CandidateSet {
        let items: BTreeSet<&ProductId> = basket.iter().collect();
        if items.len() < 2 {
            return CandidateSet::cold(Strategy::Basket);
        }
        let mut scores: BTreeMap<ProductId, f64> = BTreeMap::new();
        for first in &items {
            let Some(indices) = self.by_first_item.get(*first) else { continue };
            for &i in indices {
                let rule = &self.rules[i];
                if items.contains(&rule.consequent)
                    || !rule.antecedent.iter().all(|a| items.contains(a))
                {
                    continue;
                }
                let strength = rule.strength();
                scores
                    .entry(rule.consequent.clone())
                    .and_modify(|s| *s = s.max(strength))
                    .or_insert(strength);
            }
        }
        CandidateSet::scored(Strategy::Basket, scores)
    }

    #[must_use]
    pub fn rules(&self) -> &[AssociationRule] {
        &self.rules
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Apriori
// ---------------------------------------------------------------------------

/// Join step + prune step: size-k candidates whose every (k-1)-subset is frequent.
fn candidate_itemsets(previous: &[Itemset]) -> HashSet<Itemset> {
    let known: HashSet<&[u32]> = previous.iter().map(Vec::as_slice).collect();
    let mut out = HashSet::new();
    for (i, a) in previous.iter().enumerate() {
        let prefix = &a[..a.len() - 1];
        for b in &previous[i + 1..] {
            if &b[..b.len() - 1] != prefix {
                break;
            }
            let mut candidate = a.clone();
            candidate.push(b[b.len() - 1]);
            let all_subsets_frequent = (0..candidate.len()).all(|skip| {
                let subset: Itemset = candidate
                    .iter()
                    .enumerate()
                    .filter(|&(j, _)| j != skip)
                    .map(|(_, &item)| item)
                    .collect();
                known.contains(subset.as_slice())
            });
            if all_subsets_frequent {
                out.insert(candidate);
            }
        }
    }
    out
}

/// Count how many transactions contain each candidate, in parallel.
fn count_candidates(
    transactions: &[Itemset],
    candidates: &HashSet<Itemset>,
    size: usize,
) -> HashMap<Itemset, usize> {
    let live: HashSet<u32> = candidates.iter().flatten().copied().collect();
    transactions
        .par_iter()
        .filter(|t| t.len() >= size)
        .fold(HashMap::new, |mut acc: HashMap<Itemset, usize>, t| {
            let items: Vec<u32> = t.iter().copied().filter(|i| live.contains(i)).collect();
            let mut current = Vec::with_capacity(size);
            for_each_subset(&items, size, &mut current, &mut |subset| {
                if candidates.contains(subset) {
                    *acc.entry(subset.to_vec()).or_default() += 1;
                }
            });
            acc
        })
        .reduce(HashMap::new, |mut left, right| {
            for (itemset, count) in right {
                *left.entry(itemset).or_default() += count;
            }
            left
        })
}

/// Visit every `size`-subset of the sorted slice `items` in lexical order.
fn for_each_subset(
    items: &[u32],
    size: usize,
    current: &mut Vec<u32>,
    visit: &mut impl FnMut(&[u32]),
) {
    if current.len() == size {
        visit(current);
        return;
    }
    let needed = size - current.len();
    for i in 0..items.len() {
        if items.len() - i < needed {
            break;
        }
        current.push(items[i]);
        for_each_subset(&items[i + 1..], size, current, visit);
        current.pop();
    }
}

/// Single-consequent rules from every frequent itemset of size >= 2.
fn derive_rules(
    supports: &HashMap<Itemset, usize>,
    universe: &[ProductId],
    basket_count: usize,
    min_confidence: f64,
) -> Vec<AssociationRule> {
    #[expect(clippy::cast_precision_loss, reason = "basket counts are far below 2^52")]
    let n = basket_count as f64;
    let product = |i: u32| universe[i as usize].clone();
    let mut rules = vec![];
    for (itemset, &count) in supports.iter().filter(|(set, _)| set.len() >= 2) {
        for (pos, &consequent) in itemset.iter().enumerate() {
            let antecedent: Itemset = itemset
                .iter()
                .enumerate()
                .filter(|&(j, _)| j != pos)
                .map(|(_, &item)| item)
                .collect();
            let (Some(&ante_count), Some(&cons_count)) =
                (supports.get(&antecedent), supports.get(&vec![consequent]))
            else {
                continue;
            };
            #[expect(clippy::cast_precision_loss, reason = "basket counts are far below 2^52")]
            let (count, ante_count, cons_count) =
                (count as f64, ante_count as f64, cons_count as f64);
            let confidence = count / ante_count;
            if confidence < min_confidence {
                continue;
            }
            rules.push(AssociationRule {
                antecedent: antecedent.into_iter().map(product).collect(),
                consequent: product(consequent),
                support: count / n,
                confidence,
                lift: confidence / (cons_count / n),
            });
        }
    }
    rules
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

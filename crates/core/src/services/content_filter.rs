//! Content filtering at submission time.
//!
//! Active rules are compiled into an immutable [`FilterSnapshot`] that is
//! swapped in atomically. Readers never see a half-built matcher set.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use aho_corasick::AhoCorasick;
use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use regex::Regex;
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};
use validator::Validate;
use warden_common::{AppError, AppResult, IdGenerator, SharedClock};
use warden_db::{
    entities::{
        content_filter_rule::{self, FilterType},
        moderation_log::ModerationAction,
    },
    repositories::ContentFilterRuleRepository,
};

use super::{
    actor::Actor,
    audit::{AuditLog, NewLogEntry},
    outcome::ActionOutcome,
};

/// Maximum pattern length in characters.
const MAX_PATTERN_LENGTH: usize = 512;

/// Maximum replacement length in characters.
const MAX_REPLACEMENT_LENGTH: usize = 128;

/// Texts at least this many bytes long are filtered on the blocking pool.
const BLOCKING_THRESHOLD: usize = 16 * 1024;

/// Result of filtering a piece of text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterOutcome {
    pub filtered_text: String,
    /// Rules that replaced at least one span, each once, in rule order.
    pub matched_rule_ids: Vec<String>,
}

/// Summary of the snapshot currently installed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotInfo {
    pub loaded: bool,
    pub stale: bool,
    pub literal_rules: usize,
    pub regex_rules: usize,
    pub skipped_rules: usize,
    pub built_at: Option<DateTime<Utc>>,
}

struct CompiledRule {
    id: String,
    replacement: String,
}

/// Immutable matcher set built from the active rules.
pub struct FilterSnapshot {
    rules: Vec<CompiledRule>,
    /// ASCII literals. Aho-Corasick only folds ASCII case.
    literals: Option<AhoCorasick>,
    /// Aho-Corasick pattern index to rule index.
    literal_rules: Vec<usize>,
    /// Regex rules, plus non-ASCII literals compiled as escaped regexes so
    /// they get Unicode case folding.
    regexes: Vec<(usize, Regex)>,
    unicode_literals: usize,
    skipped: usize,
    built_at: DateTime<Utc>,
}

impl FilterSnapshot {
    /// Compile rules, given in application order.
    pub fn build(
        rules: &[content_filter_rule::Model],
        default_replacement: &str,
        built_at: DateTime<Utc>,
    ) -> AppResult<Self> {
        let mut compiled = Vec::with_capacity(rules.len());
        let mut literal_patterns = Vec::new();
        let mut literal_rules = Vec::new();
        let mut regexes = Vec::new();
        let mut unicode_literals = 0;
        let mut skipped = 0;

        for rule in rules {
            let idx = compiled.len();
            if rule.is_regex {
                match Regex::new(&format!("(?i){}", rule.pattern)) {
                    Ok(re) => regexes.push((idx, re)),
                    Err(e) => {
                        warn!(rule_id = %rule.id, error = %e, "Skipping filter rule with invalid regex");
                        skipped += 1;
                        continue;
                    }
                }
            } else if rule.pattern.is_empty() {
                skipped += 1;
                continue;
            } else if rule.pattern.is_ascii() {
                literal_patterns.push(rule.pattern.as_str());
                literal_rules.push(idx);
            } else {
                let re = Regex::new(&format!("(?i){}", regex::escape(&rule.pattern)))
                    .map_err(|e| AppError::Internal(format!("Failed to build filter matcher: {e}")))?;
                regexes.push((idx, re));
                unicode_literals += 1;
            }

            compiled.push(CompiledRule {
                id: rule.id.clone(),
                replacement: effective_replacement(&rule.replacement, default_replacement)
                    .to_string(),
            });
        }

        let literals = if literal_patterns.is_empty() {
            None
        } else {
            Some(
                AhoCorasick::builder()
                    .ascii_case_insensitive(true)
                    .build(&literal_patterns)
                    .map_err(|e| AppError::Internal(format!("Failed to build filter matcher: {e}")))?,
            )
        };

        Ok(Self {
            rules: compiled,
            literals,
            literal_rules,
            regexes,
            unicode_literals,
            skipped,
            built_at,
        })
    }

    /// Number of rules in effect.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Replace every accepted match. Earlier rules win overlapping spans.
    ///
    /// Passes repeat until the text stops changing, so the result is a
    /// fixpoint: filtering it again changes nothing. Rule validation keeps
    /// this to a single pass; the bound only matters for rules stored
    /// before validation or regexes that match across a replacement.
    #[must_use]
    pub fn apply(&self, text: &str) -> FilterOutcome {
        let mut matched = vec![false; self.rules.len()];
        let Some(mut filtered_text) = self.apply_pass(text, &mut matched) else {
            return FilterOutcome {
                filtered_text: text.to_string(),
                matched_rule_ids: Vec::new(),
            };
        };

        let mut passes = 1;
        while let Some(next) = self.apply_pass(&filtered_text, &mut matched) {
            filtered_text = next;
            passes += 1;
            if passes > self.rules.len() + 1 {
                warn!(passes, "Content filter did not settle, returning last pass");
                break;
            }
        }

        FilterOutcome {
            filtered_text,
            matched_rule_ids: matched
                .iter()
                .enumerate()
                .filter(|&(_, hit)| *hit)
                .map(|(idx, _)| self.rules[idx].id.clone())
                .collect(),
        }
    }

    /// One replacement pass. `None` when nothing changed.
    fn apply_pass(&self, text: &str, matched: &mut [bool]) -> Option<String> {
        // (rule index, start, end)
        let mut candidates: Vec<(usize, usize, usize)> = Vec::new();

        if let Some(literals) = &self.literals {
            for m in literals.find_overlapping_iter(text) {
                candidates.push((self.literal_rules[m.pattern().as_usize()], m.start(), m.end()));
            }
        }
        for (idx, re) in &self.regexes {
            for m in re.find_iter(text) {
                if m.start() < m.end() {
                    candidates.push((*idx, m.start(), m.end()));
                }
            }
        }

        if candidates.is_empty() {
            return None;
        }

        candidates.sort_unstable_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)).then(b.2.cmp(&a.2)));

        // Accepted spans are disjoint, keyed by start: only the closest span
        // starting before `end` can overlap a candidate.
        let mut accepted: BTreeMap<usize, (usize, usize)> = BTreeMap::new();
        for (idx, start, end) in candidates {
            let overlaps = accepted
                .range(..end)
                .next_back()
                .is_some_and(|(_, &(e, _))| e > start);
            if !overlaps {
                accepted.insert(start, (end, idx));
                matched[idx] = true;
            }
        }

        let mut filtered = String::with_capacity(text.len());
        let mut cursor = 0;
        for (&start, &(end, idx)) in &accepted {
            filtered.push_str(&text[cursor..start]);
            filtered.push_str(&self.rules[idx].replacement);
            cursor = end;
        }
        filtered.push_str(&text[cursor..]);

        (filtered != text).then_some(filtered)
    }
}

fn effective_replacement<'a>(replacement: &'a str, default_replacement: &'a str) -> &'a str {
    if replacement.is_empty() {
        default_replacement
    } else {
        replacement
    }
}

/// Process-wide cache of the active filter rules.
pub struct ContentFilterCache {
    repo: ContentFilterRuleRepository,
    snapshot: ArcSwapOption<FilterSnapshot>,
    stale: AtomicBool,
    /// Bumped by every invalidation. A load that started under an older
    /// generation installs its snapshot but leaves the cache stale.
    generation: AtomicU64,
    clock: SharedClock,
    default_replacement: String,
}

impl ContentFilterCache {
    /// Create an empty cache. The first `apply` loads it.
    #[must_use]
    pub fn new(
        repo: ContentFilterRuleRepository,
        clock: SharedClock,
        default_replacement: impl Into<String>,
    ) -> Self {
        Self {
            repo,
            snapshot: ArcSwapOption::empty(),
            stale: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            clock,
            default_replacement: default_replacement.into(),
        }
    }

    /// Replacement used for rules that leave theirs empty.
    #[must_use]
    pub fn default_replacement(&self) -> &str {
        &self.default_replacement
    }

    /// Fetch the active rules and install a fresh snapshot.
    pub async fn load(&self) -> AppResult<Arc<FilterSnapshot>> {
        let generation = self.generation.load(Ordering::Acquire);
        let rules = self.repo.find_active().await?;
        let snapshot = Arc::new(FilterSnapshot::build(
            &rules,
            &self.default_replacement,
            self.clock.now(),
        )?);

        self.install(Arc::clone(&snapshot), generation);
        Ok(snapshot)
    }

    fn install(&self, snapshot: Arc<FilterSnapshot>, generation: u64) {
        let rules = snapshot.len();
        let skipped = snapshot.skipped;
        self.snapshot.store(Some(snapshot));

        if self.generation.load(Ordering::Acquire) == generation {
            debug!(rules, skipped, "Content filter snapshot installed");
        } else {
            self.stale.store(true, Ordering::Release);
            debug!(rules, skipped, "Content filter invalidated during load, snapshot kept stale");
        }
    }

    /// Mark the installed snapshot out of date. The next `apply` reloads;
    /// the old snapshot stays in place until a new one is built.
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.stale.store(true, Ordering::Release);
        debug!("Content filter cache invalidated");
    }

    /// Load at startup.
    pub async fn warm(&self) -> AppResult<()> {
        self.stale.store(false, Ordering::Release);
        match self.load().await {
            Ok(snapshot) => {
                info!(rules = snapshot.len(), "Content filter cache warmed");
                Ok(())
            }
            Err(e) => {
                self.stale.store(true, Ordering::Release);
                Err(e)
            }
        }
    }

    async fn current(&self) -> AppResult<Arc<FilterSnapshot>> {
        let existing = self.snapshot.load_full();
        if let Some(snapshot) = &existing {
            if !self.stale.load(Ordering::Acquire) {
                return Ok(Arc::clone(snapshot));
            }
        }

        self.stale.store(false, Ordering::Release);
        match self.load().await {
            Ok(snapshot) => Ok(snapshot),
            Err(e) => {
                self.stale.store(true, Ordering::Release);
                match existing {
                    Some(snapshot) => {
                        warn!(error = %e, "Filter reload failed, using previous snapshot");
                        Ok(snapshot)
                    }
                    None => Err(e),
                }
            }
        }
    }

    /// Filter `text` against the active rules.
    pub async fn apply(&self, text: &str) -> AppResult<FilterOutcome> {
        let snapshot = self.current().await?;
        if text.len() < BLOCKING_THRESHOLD {
            return Ok(snapshot.apply(text));
        }

        let text = text.to_string();
        tokio::task::spawn_blocking(move || snapshot.apply(&text))
            .await
            .map_err(|e| AppError::Internal(format!("Content filter task failed: {e}")))
    }

    #[must_use]
    pub fn snapshot_info(&self) -> SnapshotInfo {
        let stale = self.stale.load(Ordering::Acquire);
        match self.snapshot.load_full() {
            Some(snapshot) => SnapshotInfo {
                loaded: true,
                stale,
                literal_rules: snapshot.literal_rules.len() + snapshot.unicode_literals,
                regex_rules: snapshot.regexes.len() - snapshot.unicode_literals,
                skipped_rules: snapshot.skipped,
                built_at: Some(snapshot.built_at),
            },
            None => SnapshotInfo {
                loaded: false,
                stale,
                literal_rules: 0,
                regex_rules: 0,
                skipped_rules: 0,
                built_at: None,
            },
        }
    }
}

/// Input for creating a filter rule.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateRuleInput {
    #[serde(rename = "type")]
    pub filter_type: FilterType,
    #[validate(length(min = 1, max = 512))]
    pub pattern: String,
    #[serde(default)]
    #[validate(length(max = 128))]
    pub replacement: String,
    #[serde(default)]
    pub is_regex: bool,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

const fn default_active() -> bool {
    true
}

/// Input for updating a filter rule. Absent fields are left unchanged.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRuleInput {
    pub rule_id: String,
    #[serde(rename = "type")]
    pub filter_type: Option<FilterType>,
    #[validate(length(min = 1, max = 512))]
    pub pattern: Option<String>,
    #[validate(length(max = 128))]
    pub replacement: Option<String>,
    pub is_regex: Option<bool>,
    pub is_active: Option<bool>,
}

/// Compiled pattern of a rule, for validation.
enum RulePattern {
    /// Lowercased literal.
    Literal(String),
    Regex(Regex),
}

impl RulePattern {
    fn compile(pattern: &str, is_regex: bool) -> AppResult<Self> {
        if is_regex {
            Regex::new(&format!("(?i){pattern}"))
                .map(Self::Regex)
                .map_err(|e| AppError::Validation(format!("Invalid regex pattern: {e}")))
        } else {
            Ok(Self::Literal(pattern.to_lowercase()))
        }
    }

    /// Whether splicing `replacement` into text can produce a new match.
    ///
    /// Literals are checked exactly, including matches that straddle either
    /// edge of the replacement. Regexes are only checked against the
    /// replacement itself.
    fn completed_by(&self, replacement: &str) -> bool {
        match self {
            Self::Regex(re) => re.is_match(replacement),
            Self::Literal(pattern) => {
                let replacement = replacement.to_lowercase();
                if replacement.contains(pattern.as_str()) || pattern.contains(&replacement) {
                    return true;
                }
                replacement.char_indices().skip(1).any(|(i, _)| {
                    pattern.ends_with(&replacement[..i]) || pattern.starts_with(&replacement[i..])
                })
            }
        }
    }
}

/// Check a rule on its own before it is stored.
///
/// The effective replacement must not be able to form a match of the
/// rule's own pattern, alone or joined with the text around it.
pub fn validate_rule(
    pattern: &str,
    replacement: &str,
    is_regex: bool,
    default_replacement: &str,
) -> AppResult<()> {
    if pattern.trim().is_empty() {
        return Err(AppError::Validation("Pattern must not be empty".to_string()));
    }
    if pattern.chars().count() > MAX_PATTERN_LENGTH {
        return Err(AppError::Validation(format!(
            "Pattern must be at most {MAX_PATTERN_LENGTH} characters"
        )));
    }
    if replacement.chars().count() > MAX_REPLACEMENT_LENGTH {
        return Err(AppError::Validation(format!(
            "Replacement must be at most {MAX_REPLACEMENT_LENGTH} characters"
        )));
    }

    let replacement = effective_replacement(replacement, default_replacement);
    if RulePattern::compile(pattern, is_regex)?.completed_by(replacement) {
        return Err(AppError::Validation(format!(
            "Replacement \"{replacement}\" can form a match of the rule's own pattern"
        )));
    }

    Ok(())
}

/// Check a rule against the other active rules.
///
/// Neither this rule's replacement may form a match of another rule, nor
/// another rule's replacement a match of this one. Rules whose stored
/// regex no longer compiles are never applied and are ignored here.
pub fn validate_against_active(
    pattern: &str,
    replacement: &str,
    is_regex: bool,
    active: &[content_filter_rule::Model],
    default_replacement: &str,
) -> AppResult<()> {
    let own = RulePattern::compile(pattern, is_regex)?;
    let replacement = effective_replacement(replacement, default_replacement);

    for other in active {
        let Ok(other_pattern) = RulePattern::compile(&other.pattern, other.is_regex) else {
            continue;
        };
        let other_replacement = effective_replacement(&other.replacement, default_replacement);

        if other_pattern.completed_by(replacement) {
            return Err(AppError::Validation(format!(
                "Replacement \"{replacement}\" can form a match of rule {}",
                other.id
            )));
        }
        if own.completed_by(other_replacement) {
            return Err(AppError::Validation(format!(
                "Pattern matches text produced by rule {}",
                other.id
            )));
        }
    }

    Ok(())
}

/// Administration of filter rules.
#[derive(Clone)]
pub struct ContentFilterService {
    repo: ContentFilterRuleRepository,
    cache: Arc<ContentFilterCache>,
    audit: AuditLog,
    clock: SharedClock,
    id_gen: IdGenerator,
}

impl ContentFilterService {
    #[must_use]
    pub const fn new(
        repo: ContentFilterRuleRepository,
        cache: Arc<ContentFilterCache>,
        audit: AuditLog,
        clock: SharedClock,
    ) -> Self {
        Self {
            repo,
            cache,
            audit,
            clock,
            id_gen: IdGenerator::new(),
        }
    }

    /// The shared cache this service invalidates.
    #[must_use]
    pub fn cache(&self) -> &Arc<ContentFilterCache> {
        &self.cache
    }

    pub async fn create_rule(
        &self,
        actor: &Actor,
        input: CreateRuleInput,
    ) -> AppResult<ActionOutcome<content_filter_rule::Model>> {
        actor.require_admin("manage content filters")?;
        input.validate()?;
        validate_rule(
            &input.pattern,
            &input.replacement,
            input.is_regex,
            self.cache.default_replacement(),
        )?;
        if input.is_active {
            let active = self.repo.find_active().await?;
            validate_against_active(
                &input.pattern,
                &input.replacement,
                input.is_regex,
                &active,
                self.cache.default_replacement(),
            )?;
        }

        let model = content_filter_rule::ActiveModel {
            id: Set(self.id_gen.generate()),
            filter_type: Set(input.filter_type),
            pattern: Set(input.pattern),
            replacement: Set(input.replacement),
            is_regex: Set(input.is_regex),
            is_active: Set(input.is_active),
            created_by: Set(actor.id.clone()),
            created_at: Set(self.clock.now().into()),
            updated_at: Set(None),
        };

        let rule = self.repo.create(model).await?;
        self.cache.invalidate();

        info!(rule_id = %rule.id, admin_id = %actor.id, "Filter rule created");

        let outcome = ActionOutcome::new(rule.clone()).with(
            self.audit
                .record(
                    NewLogEntry::new(&actor.id, ModerationAction::CreateFilter).details(json!({
                        "ruleId": rule.id,
                        "type": rule.filter_type,
                        "pattern": rule.pattern,
                        "isRegex": rule.is_regex,
                        "isActive": rule.is_active,
                    })),
                )
                .await,
        );

        Ok(outcome)
    }

    pub async fn update_rule(
        &self,
        actor: &Actor,
        input: UpdateRuleInput,
    ) -> AppResult<ActionOutcome<content_filter_rule::Model>> {
        actor.require_admin("manage content filters")?;
        input.validate()?;

        let rule = self.repo.get_by_id(&input.rule_id).await?;

        let pattern = input.pattern.unwrap_or_else(|| rule.pattern.clone());
        let replacement = input.replacement.unwrap_or_else(|| rule.replacement.clone());
        let is_regex = input.is_regex.unwrap_or(rule.is_regex);
        let is_active = input.is_active.unwrap_or(rule.is_active);
        validate_rule(
            &pattern,
            &replacement,
            is_regex,
            self.cache.default_replacement(),
        )?;
        if is_active {
            let others: Vec<_> = self
                .repo
                .find_active()
                .await?
                .into_iter()
                .filter(|other| other.id != rule.id)
                .collect();
            validate_against_active(
                &pattern,
                &replacement,
                is_regex,
                &others,
                self.cache.default_replacement(),
            )?;
        }

        let mut active: content_filter_rule::ActiveModel = rule.into();
        active.pattern = Set(pattern);
        active.replacement = Set(replacement);
        active.is_regex = Set(is_regex);
        active.is_active = Set(is_active);
        if let Some(filter_type) = input.filter_type {
            active.filter_type = Set(filter_type);
        }
        active.updated_at = Set(Some(self.clock.now().into()));

        let updated = self.repo.update(active).await?;
        self.cache.invalidate();

        info!(rule_id = %updated.id, admin_id = %actor.id, "Filter rule updated");

        let outcome = ActionOutcome::new(updated.clone()).with(
            self.audit
                .record(
                    NewLogEntry::new(&actor.id, ModerationAction::UpdateFilter).details(json!({
                        "ruleId": updated.id,
                        "type": updated.filter_type,
                        "pattern": updated.pattern,
                        "isRegex": updated.is_regex,
                        "isActive": updated.is_active,
                    })),
                )
                .await,
        );

        Ok(outcome)
    }

    pub async fn delete_rule(&self, actor: &Actor, rule_id: &str) -> AppResult<ActionOutcome<()>> {
        actor.require_admin("manage content filters")?;

        self.repo.delete(rule_id).await?;
        self.cache.invalidate();

        info!(rule_id = %rule_id, admin_id = %actor.id, "Filter rule deleted");

        Ok(ActionOutcome::new(()).with(
            self.audit
                .record(
                    NewLogEntry::new(&actor.id, ModerationAction::DeleteFilter)
                        .details(json!({ "ruleId": rule_id })),
                )
                .await,
        ))
    }

    pub async fn get_rule(
        &self,
        actor: &Actor,
        rule_id: &str,
    ) -> AppResult<content_filter_rule::Model> {
        actor.require_admin("manage content filters")?;
        self.repo.get_by_id(rule_id).await
    }

    /// Every rule, active or not, in application order.
    pub async fn list_rules(
        &self,
        actor: &Actor,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<content_filter_rule::Model>> {
        actor.require_admin("manage content filters")?;
        self.repo.find_all(limit, offset).await
    }

    /// Show what the active rules would do to `text`.
    pub async fn preview(&self, actor: &Actor, text: &str) -> AppResult<FilterOutcome> {
        actor.require_admin("manage content filters")?;
        self.cache.apply(text).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, DbErr, MockDatabase, MockExecResult};
    use warden_common::{Clock, ManualClock};
    use warden_db::{
        entities::moderation_log,
        repositories::ModerationLogRepository,
        test_utils::{into_transaction_log, recorded_log_entries},
    };

    fn rule(id: &str, pattern: &str, replacement: &str, is_regex: bool) -> content_filter_rule::Model {
        content_filter_rule::Model {
            id: id.to_string(),
            filter_type: FilterType::Word,
            pattern: pattern.to_string(),
            replacement: replacement.to_string(),
            is_regex,
            is_active: true,
            created_by: "admin1".to_string(),
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    fn snapshot(rules: &[content_filter_rule::Model]) -> FilterSnapshot {
        FilterSnapshot::build(rules, "xxx", Utc::now()).unwrap()
    }

    fn cache(db: MockDatabase) -> ContentFilterCache {
        let conn = Arc::new(db.into_connection());
        ContentFilterCache::new(
            ContentFilterRuleRepository::new(conn),
            Arc::new(ManualClock::from_recent()),
            "xxx",
        )
    }

    #[test]
    fn test_literal_match_is_case_insensitive() {
        let snap = snapshot(&[rule("r1", "spam", "***", false)]);
        let outcome = snap.apply("SPAM and Spam and spam");

        assert_eq!(outcome.filtered_text, "*** and *** and ***");
        assert_eq!(outcome.matched_rule_ids, vec!["r1".to_string()]);
    }

    #[test]
    fn test_empty_replacement_uses_default() {
        let snap = snapshot(&[rule("r1", "scam", "", false)]);
        assert_eq!(snap.apply("a scam").filtered_text, "a xxx");
    }

    #[test]
    fn test_earlier_rule_wins_overlap() {
        let snap = snapshot(&[
            rule("r1", "bad word", "[removed]", false),
            rule("r2", "word", "w***", false),
        ]);
        let outcome = snap.apply("a bad word and a word");

        assert_eq!(outcome.filtered_text, "a [removed] and a w***");
        assert_eq!(
            outcome.matched_rule_ids,
            vec!["r1".to_string(), "r2".to_string()]
        );
    }

    #[test]
    fn test_regex_rules() {
        let snap = snapshot(&[rule("r1", r"https?://evil\.example\S*", "[link]", true)]);
        let outcome = snap.apply("see HTTP://EVIL.example/path now");

        assert_eq!(outcome.filtered_text, "see [link] now");
    }

    #[test]
    fn test_invalid_regex_is_skipped() {
        let snap = snapshot(&[rule("r1", "(unclosed", "x", true), rule("r2", "spam", "***", false)]);

        assert_eq!(snap.len(), 1);
        assert_eq!(snap.skipped, 1);
        assert_eq!(snap.apply("spam").filtered_text, "***");
    }

    #[test]
    fn test_empty_rule_set_is_identity() {
        let snap = snapshot(&[]);
        let outcome = snap.apply("anything at all");

        assert!(snap.is_empty());
        assert_eq!(outcome.filtered_text, "anything at all");
        assert!(outcome.matched_rule_ids.is_empty());
    }

    #[test]
    fn test_apply_is_idempotent() {
        let snap = snapshot(&[rule("r1", "spam", "***", false), rule("r2", "scam", "", false)]);
        let once = snap.apply("spam scam spam");
        let twice = snap.apply(&once.filtered_text);

        assert_eq!(once.filtered_text, twice.filtered_text);
        assert!(twice.matched_rule_ids.is_empty());
    }

    #[test]
    fn test_validate_rule() {
        assert!(validate_rule("spam", "***", false, "xxx").is_ok());
        assert!(matches!(
            validate_rule("  ", "***", false, "xxx"),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            validate_rule("(bad", "", true, "xxx"),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            validate_rule("spam", "SPAM!", false, "xxx"),
            Err(AppError::Validation(_))
        ));
        // Default replacement is checked too.
        assert!(matches!(
            validate_rule("x+", "", true, "xxx"),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            validate_rule("spam", &"*".repeat(129), false, "xxx"),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_replacement_joining_neighbours_is_rejected() {
        // "abb" would become "ab", then "a".
        assert!(matches!(
            validate_rule("ab", "a", false, "xxx"),
            Err(AppError::Validation(_))
        ));
        // "se" + "xxx" contains "sex".
        assert!(matches!(
            validate_rule("sex", "", false, "xxx"),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            validate_rule("ab", "", false, ""),
            Err(AppError::Validation(_))
        ));
        assert!(validate_rule("sex", "***", false, "xxx").is_ok());
    }

    #[test]
    fn test_replacement_must_not_trigger_other_rules() {
        let foo = rule("r1", "foo", "bar", false);
        let bar = rule("r2", "bar", "***", false);

        assert!(matches!(
            validate_against_active("bar", "***", false, std::slice::from_ref(&foo), "xxx"),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            validate_against_active("foo", "bar", false, std::slice::from_ref(&bar), "xxx"),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            validate_against_active(r"b\w+", "***", true, &[foo], "xxx"),
            Err(AppError::Validation(_))
        ));
        assert!(validate_against_active("scam", "", false, &[bar], "xxx").is_ok());
    }

    #[test]
    fn test_apply_settles_chained_rules() {
        // Stored before cross-rule validation existed.
        let snap = snapshot(&[rule("r1", "foo", "bar", false), rule("r2", "bar", "***", false)]);
        let once = snap.apply("foo");
        assert_eq!(once.filtered_text, "***");
        assert_eq!(once.matched_rule_ids, vec!["r1".to_string(), "r2".to_string()]);
        assert_eq!(snap.apply(&once.filtered_text).filtered_text, "***");

        let snap = snapshot(&[rule("r1", "ab", "a", false)]);
        let once = snap.apply("abb");
        assert_eq!(once.filtered_text, "a");
        assert_eq!(snap.apply(&once.filtered_text).filtered_text, "a");
    }

    #[test]
    fn test_non_ascii_literal_folds_case() {
        let snap = snapshot(&[rule("r1", "späm", "***", false), rule("r2", "spam", "###", false)]);
        let outcome = snap.apply("SPÄM or SPAM");

        assert_eq!(outcome.filtered_text, "*** or ###");
        assert_eq!(outcome.matched_rule_ids, vec!["r1".to_string(), "r2".to_string()]);
    }

    #[tokio::test]
    async fn test_large_text_is_filtered_in_full() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![rule("r1", "a", "*", false)]]);
        let cache = cache(db);

        let outcome = cache.apply(&"a".repeat(100_000)).await.unwrap();
        assert_eq!(outcome.filtered_text, "*".repeat(100_000));
        assert_eq!(outcome.matched_rule_ids, vec!["r1".to_string()]);
    }

    #[tokio::test]
    async fn test_deactivate_and_invalidate_restores_text() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![rule("r1", "spam", "***", false)]])
            .append_query_results([Vec::<content_filter_rule::Model>::new()]);
        let cache = cache(db);

        let first = cache.apply("this is spam").await.unwrap();
        assert_eq!(first.filtered_text, "this is ***");

        // Served from the snapshot, no query.
        let again = cache.apply("this is spam").await.unwrap();
        assert_eq!(again.filtered_text, "this is ***");

        cache.invalidate();
        let after = cache.apply("this is spam").await.unwrap();
        assert_eq!(after.filtered_text, "this is spam");
        assert!(after.matched_rule_ids.is_empty());
    }

    #[tokio::test]
    async fn test_reload_failure_keeps_previous_snapshot() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![rule("r1", "spam", "***", false)]])
            .append_query_errors([DbErr::Custom("connection lost".to_string())]);
        let cache = cache(db);

        cache.warm().await.unwrap();
        cache.invalidate();

        let outcome = cache.apply("spam").await.unwrap();
        assert_eq!(outcome.filtered_text, "***");
        assert!(cache.snapshot_info().stale);
    }

    #[tokio::test]
    async fn test_invalidation_during_load_keeps_cache_stale() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<content_filter_rule::Model>::new()])
            .append_query_results([Vec::<content_filter_rule::Model>::new()]);
        let cache = cache(db);

        // A slow load reads the rule set before it is deactivated...
        let slow_generation = cache.generation.load(Ordering::Acquire);
        let slow_snapshot = Arc::new(snapshot(&[rule("r1", "spam", "***", false)]));

        // ...an admin deactivates the rule and another request reloads...
        cache.invalidate();
        assert_eq!(cache.apply("spam").await.unwrap().filtered_text, "spam");

        // ...then the slow load finishes last.
        cache.install(slow_snapshot, slow_generation);
        assert!(cache.snapshot_info().stale);

        assert_eq!(cache.apply("spam").await.unwrap().filtered_text, "spam");
        assert!(!cache.snapshot_info().stale);
    }

    #[tokio::test]
    async fn test_load_failure_without_snapshot() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_errors([DbErr::Custom("connection refused".to_string())]);
        let cache = cache(db);

        let result = cache.apply("spam").await;
        assert!(matches!(result, Err(AppError::Database(_))));
        assert!(!cache.snapshot_info().loaded);
    }

    #[tokio::test]
    async fn test_create_rule_invalidates_cache() {
        let clock = ManualClock::from_recent();
        let now = clock.now();
        let created = rule("r2", "scam", "", false);
        let log = moderation_log::Model {
            id: "log1".to_string(),
            moderator_id: "admin1".to_string(),
            action: ModerationAction::CreateFilter,
            target_user_id: None,
            target_post_id: None,
            target_thread_id: None,
            reason: None,
            details: json!({ "ruleId": "r2" }),
            created_at: now.into(),
        };

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![rule("r1", "spam", "***", false)]])
            .append_query_results([vec![rule("r1", "spam", "***", false)]])
            .append_query_results([[created.clone()]])
            .append_query_results([[log]])
            .append_query_results([vec![rule("r1", "spam", "***", false), created]]);
        let conn = Arc::new(db.into_connection());
        let clock: SharedClock = Arc::new(clock);

        let cache = Arc::new(ContentFilterCache::new(
            ContentFilterRuleRepository::new(Arc::clone(&conn)),
            Arc::clone(&clock),
            "xxx",
        ));
        let svc = ContentFilterService::new(
            ContentFilterRuleRepository::new(Arc::clone(&conn)),
            Arc::clone(&cache),
            AuditLog::new(ModerationLogRepository::new(Arc::clone(&conn)), Arc::clone(&clock)),
            clock,
        );

        cache.warm().await.unwrap();
        assert_eq!(cache.apply("a scam").await.unwrap().filtered_text, "a scam");

        let outcome = svc
            .create_rule(
                &Actor::admin("admin1"),
                CreateRuleInput {
                    filter_type: FilterType::Word,
                    pattern: "scam".to_string(),
                    replacement: String::new(),
                    is_regex: false,
                    is_active: true,
                },
            )
            .await
            .unwrap();
        assert!(!outcome.is_degraded());

        assert_eq!(cache.apply("a scam").await.unwrap().filtered_text, "a xxx");

        drop(svc);
        drop(cache);
        assert_eq!(
            recorded_log_entries(&into_transaction_log(conn)),
            vec![("admin1".to_string(), "create_filter".to_string())]
        );
    }

    #[tokio::test]
    async fn test_create_rule_conflicting_with_active_rule() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![rule("r1", "foo", "bar", false)]]);
        let conn = Arc::new(db.into_connection());
        let clock: SharedClock = Arc::new(ManualClock::from_recent());
        let cache = Arc::new(ContentFilterCache::new(
            ContentFilterRuleRepository::new(Arc::clone(&conn)),
            Arc::clone(&clock),
            "xxx",
        ));
        let svc = ContentFilterService::new(
            ContentFilterRuleRepository::new(Arc::clone(&conn)),
            cache,
            AuditLog::new(ModerationLogRepository::new(conn), Arc::clone(&clock)),
            clock,
        );

        let result = svc
            .create_rule(
                &Actor::admin("admin1"),
                CreateRuleInput {
                    filter_type: FilterType::Word,
                    pattern: "bar".to_string(),
                    replacement: "***".to_string(),
                    is_regex: false,
                    is_active: true,
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_rule_admin_requires_admin() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).append_exec_results([
            MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            },
        ]);
        let conn = Arc::new(db.into_connection());
        let clock: SharedClock = Arc::new(ManualClock::from_recent());
        let cache = Arc::new(ContentFilterCache::new(
            ContentFilterRuleRepository::new(Arc::clone(&conn)),
            Arc::clone(&clock),
            "xxx",
        ));
        let svc = ContentFilterService::new(
            ContentFilterRuleRepository::new(Arc::clone(&conn)),
            cache,
            AuditLog::new(ModerationLogRepository::new(conn), Arc::clone(&clock)),
            clock,
        );

        let result = svc.delete_rule(&Actor::moderator("m1"), "r1").await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }
}

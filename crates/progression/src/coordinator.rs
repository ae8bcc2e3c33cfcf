// ---------------------------------------------------------------------------
// coordinator – Façade owning the canonical in-memory save state
// ---------------------------------------------------------------------------
//
// All collaborators (store, backup manager, validator, catalog, clock) are
// injected at construction; the coordinator never reaches for ambient
// globals. Mutating calls take `&mut self`, so concurrent mutation is ruled
// out by the borrow checker; multi-threaded callers wrap the coordinator in
// a mutex and `spawn_scheduler` does exactly that.
//
// `modified_at` is bumped by mutating events, never by saving, so saving an
// unchanged state twice produces byte-identical slot files.

use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use save::{
    decode_slot, encode_slot, peek_metadata, BackupManager, BackupSchedule, BackupType, Clock,
    DecodeReport, HmacKey, ProgressionState, SaveData, SaveError, SaveStore, SaveValidator,
    SchedulerHandle, SecurityLevel, SlotMetadata, XpCurve,
};
use tracing::{debug, info, warn};

use crate::catalog::CardCatalog;
use crate::events::{BattleOutcome, ChamberOutcome, LoadReport, LoadSource, XpAward};
use crate::reconcile::reconcile;
use crate::rewards::{
    battle_xp, chamber_reward, level_up_rewards, starter_collection, FINAL_CHAMBER,
    FIRST_COMPLETION_XP_MULTIPLIER,
};
use crate::summary::SaveSummary;

/// Interval between scheduled Auto backups.
const AUTO_BACKUP_INTERVAL_MINUTES: i64 = 10;

/// Security policy applied to every slot the coordinator writes or reads.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub security_level: SecurityLevel,
    /// Required at encrypting security levels; ignored below them.
    pub password: Option<String>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            security_level: SecurityLevel::Standard,
            password: None,
        }
    }
}

/// Single source of truth for save/progression state during a session.
pub struct ProgressionCoordinator {
    store: SaveStore,
    backups: BackupManager,
    validator: SaveValidator,
    catalog: Box<dyn CardCatalog>,
    clock: Arc<dyn Clock>,
    key: HmacKey,
    config: CoordinatorConfig,
    curve: XpCurve,
    schedule: BackupSchedule,

    current: Option<SaveData>,
    active_slot: Option<String>,
    last_autosave: Option<DateTime<Utc>>,
}

impl ProgressionCoordinator {
    pub fn new(
        store: SaveStore,
        backups: BackupManager,
        validator: SaveValidator,
        catalog: Box<dyn CardCatalog>,
        clock: Arc<dyn Clock>,
        key: HmacKey,
        config: CoordinatorConfig,
    ) -> Self {
        let mut schedule = BackupSchedule::new(Duration::minutes(AUTO_BACKUP_INTERVAL_MINUTES));
        schedule.seed(
            backups.last_backup_time(BackupType::Auto),
            backups.last_backup_time(BackupType::Daily),
            backups.last_backup_time(BackupType::Weekly),
        );
        Self {
            store,
            backups,
            validator,
            catalog,
            clock,
            key,
            config,
            curve: XpCurve::default(),
            schedule,
            current: None,
            active_slot: None,
            last_autosave: None,
        }
    }

    pub fn current(&self) -> Option<&SaveData> {
        self.current.as_ref()
    }

    pub fn summary(&self) -> Option<SaveSummary> {
        self.current.as_ref().map(SaveSummary::of)
    }

    pub fn backups(&self) -> &BackupManager {
        &self.backups
    }

    pub fn backups_mut(&mut self) -> &mut BackupManager {
        &mut self.backups
    }

    // ------------------------------------------------------------------
    // Game lifecycle
    // ------------------------------------------------------------------

    /// Begin a fresh game in `slot`. If a session is already active and the
    /// slot holds data, that data is captured as an Emergency backup first.
    pub fn start_new_game(&mut self, player_name: &str, slot: &str) -> Result<SaveSummary, SaveError> {
        if self.current.is_some() && self.store.exists(slot) {
            self.backups
                .create_backup(BackupType::Emergency, slot, "superseded by new game")?;
        }

        let now = self.clock.now().to_rfc3339();
        let mut save = SaveData::new(player_name, &now);
        save.card_collection = starter_collection();

        self.current = Some(save);
        self.active_slot = Some(slot.to_string());
        self.persist(slot)?;
        self.backups
            .create_backup(BackupType::SessionStart, slot, "new game")?;

        info!(player_name, slot, "new game started");
        self.summary().ok_or(SaveError::NoActiveSave)
    }

    /// Persist the canonical state to `slot`. Optionally also records a
    /// Manual backup of the freshly-written slot.
    pub fn save_game(&mut self, slot: &str, create_backup: bool) -> Result<(), SaveError> {
        if self.current.is_none() {
            return Err(SaveError::NoActiveSave);
        }
        self.persist(slot)?;
        if create_backup {
            self.backups
                .create_backup(BackupType::Manual, slot, "manual save")?;
        }
        Ok(())
    }

    /// Load a slot into canonical state. Falls back from the slot file to
    /// its `.bak`, then to the newest backup archive, before giving up.
    /// Corrupted state is never returned silently.
    pub fn load_game(&mut self, slot: &str) -> Result<LoadReport, SaveError> {
        let (mut save, decode_report, source) = self.load_with_fallback(slot)?;

        let validation = self
            .validator
            .validate(&save, self.config.security_level);
        if !validation.is_valid() {
            if self.config.security_level.strict() {
                return Err(SaveError::Validation(validation.errors));
            }
            for error in &validation.errors {
                warn!(slot, "validation: {error}");
            }
        }

        let now = self.clock.now();
        let mut warnings = decode_report.warnings.clone();
        warnings.extend(reconcile(&mut save, self.catalog.as_ref(), now));

        // Session bookkeeping; deliberately not a modified_at bump.
        save.session_start_time = now.to_rfc3339();
        save.player_profile.last_played = now.to_rfc3339();

        self.current = Some(save);
        self.active_slot = Some(slot.to_string());

        // A fallback load leaves the primary slot bad, and a migrated load
        // leaves it in an old format; heal it from the recovered state.
        if source != LoadSource::Primary || decode_report.migration.steps_applied > 0 {
            self.persist(slot)?;
        }
        self.backups
            .create_backup(BackupType::SessionStart, slot, "session start")?;

        info!(slot, ?source, "game loaded");
        Ok(LoadReport {
            slot: slot.to_string(),
            source,
            migration: decode_report.migration,
            validation,
            warnings,
        })
    }

    /// Remove a slot (and its `.bak`). The in-memory state is untouched,
    /// but the slot is no longer the active save target.
    pub fn delete_save(&mut self, slot: &str) -> Result<(), SaveError> {
        self.store.delete_slot(slot)?;
        if self.active_slot.as_deref() == Some(slot) {
            self.active_slot = None;
        }
        Ok(())
    }

    /// All slots with their listing metadata, without decrypting or
    /// migrating anything.
    pub fn list_saves(&self) -> Result<Vec<(String, SlotMetadata)>, SaveError> {
        let mut saves = Vec::new();
        for slot in self.store.list_slots()? {
            match self.store.load(&slot).and_then(|b| peek_metadata(&b)) {
                Ok(metadata) => saves.push((slot, metadata)),
                Err(e) => warn!(slot, error = %e, "unreadable slot skipped in listing"),
            }
        }
        Ok(saves)
    }

    // ------------------------------------------------------------------
    // Game events
    // ------------------------------------------------------------------

    /// Record a battle result: counters, streaks, XP, and level in one
    /// atomic update. The returned outcome is the only notification channel.
    pub fn record_battle_result(
        &mut self,
        won: bool,
        enemy_type: &str,
        damage_dealt: u64,
        damage_taken: u64,
        cards_played: u64,
    ) -> Result<BattleOutcome, SaveError> {
        let now = self.clock.now().to_rfc3339();
        let curve = self.curve.clone();
        let save = self.current.as_mut().ok_or(SaveError::NoActiveSave)?;

        if won {
            save.player_profile.total_wins += 1;
            save.player_profile.win_streak += 1;
            save.player_profile.best_win_streak = save
                .player_profile
                .best_win_streak
                .max(save.player_profile.win_streak);
            save.progression.battles_won += 1;
            save.progression.daily_wins += 1;
            save.progression.weekly_wins += 1;
            if enemy_type.ends_with("boss") {
                *save
                    .progression
                    .boss_defeats
                    .entry(enemy_type.to_string())
                    .or_insert(0) += 1;
            }
            if save.player_profile.progression_state < ProgressionState::CombatReady {
                save.player_profile.progression_state = ProgressionState::CombatReady;
            }
        } else {
            save.player_profile.total_losses += 1;
            save.player_profile.win_streak = 0;
            save.progression.battles_lost += 1;
        }

        save.progression.cards_played += cards_played;
        save.progression.damage_dealt += damage_dealt;
        save.progression.damage_taken += damage_taken;

        let active_deck = save.card_collection.active_deck.clone();
        if !active_deck.is_empty() {
            let tally = if won {
                &mut save.card_collection.deck_wins
            } else {
                &mut save.card_collection.deck_losses
            };
            *tally.entry(active_deck).or_insert(0) += 1;
        }

        let amount = battle_xp(won, save.player_profile.win_streak);
        let xp = award_xp(save, &curve, amount);

        save.modified_at = now.clone();
        save.player_profile.last_played = now;

        debug!(
            won,
            enemy_type,
            xp = xp.amount,
            streak = save.player_profile.win_streak,
            "battle recorded"
        );
        Ok(BattleOutcome {
            won,
            enemy_type: enemy_type.to_string(),
            total_wins: save.player_profile.total_wins,
            total_losses: save.player_profile.total_losses,
            win_streak: save.player_profile.win_streak,
            best_win_streak: save.player_profile.best_win_streak,
            xp,
        })
    }

    /// Complete a chamber. Idempotent: the first completion records the
    /// timestamp, awards doubled chamber XP plus guaranteed cards, unlocks
    /// follow-up chambers, and snapshots a Progression backup; repeats
    /// report `already_completed` and change nothing.
    pub fn complete_chamber(
        &mut self,
        chamber_id: &str,
        completed_at: DateTime<Utc>,
    ) -> Result<ChamberOutcome, SaveError> {
        let now = self.clock.now().to_rfc3339();
        let curve = self.curve.clone();
        let save = self.current.as_mut().ok_or(SaveError::NoActiveSave)?;

        if save.progression.is_chamber_completed(chamber_id) {
            debug!(chamber_id, "chamber already completed");
            return Ok(ChamberOutcome {
                chamber_id: chamber_id.to_string(),
                already_completed: true,
                xp: None,
                cards_awarded: Vec::new(),
                chambers_unlocked: Vec::new(),
            });
        }

        let reward = chamber_reward(chamber_id);

        save.progression
            .chambers_completed
            .insert(chamber_id.to_string());
        save.progression
            .chamber_completion_times
            .insert(chamber_id.to_string(), completed_at.to_rfc3339());

        let mut cards_awarded = Vec::new();
        for card_id in reward
            .guaranteed_cards
            .iter()
            .chain(reward.first_completion_treasures.iter())
        {
            save.card_collection.add_card(card_id, 1);
            cards_awarded.push((*card_id).to_string());
        }

        let mut chambers_unlocked = Vec::new();
        for unlock in &reward.unlocks {
            if let Some(chamber) = unlock.strip_prefix("chamber_") {
                if save.player_profile.unlocked_chambers.insert(chamber.to_string()) {
                    chambers_unlocked.push(chamber.to_string());
                }
            }
        }

        let xp = award_xp(save, &curve, reward.xp * FIRST_COMPLETION_XP_MULTIPLIER);

        if save.player_profile.progression_state < ProgressionState::ChamberExplorer {
            save.player_profile.progression_state = ProgressionState::ChamberExplorer;
        }
        if chamber_id == FINAL_CHAMBER {
            save.player_profile.progression_state = ProgressionState::PharaohVictor;
        }

        save.modified_at = now.clone();
        save.player_profile.last_played = now;

        info!(chamber_id, xp = xp.amount, "chamber completed");
        let outcome = ChamberOutcome {
            chamber_id: chamber_id.to_string(),
            already_completed: false,
            xp: Some(xp),
            cards_awarded,
            chambers_unlocked,
        };

        // Milestone snapshot: persist, then archive the fresh slot.
        if let Some(slot) = self.active_slot.clone() {
            self.persist(&slot)?;
            self.backups.create_backup(
                BackupType::Progression,
                &slot,
                &format!("chamber '{chamber_id}' completed"),
            )?;
        }
        Ok(outcome)
    }

    /// Add to cumulative playtime. A state mutation like any other.
    pub fn add_playtime(&mut self, seconds: f64) -> Result<(), SaveError> {
        let now = self.clock.now().to_rfc3339();
        let save = self.current.as_mut().ok_or(SaveError::NoActiveSave)?;
        save.player_profile.playtime_seconds += seconds.max(0.0);
        save.modified_at = now;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Scheduling
    // ------------------------------------------------------------------

    /// One scheduler tick: auto-save if the settings interval elapsed, then
    /// create whichever backups have crossed their boundaries. Returns the
    /// backup types created.
    pub fn tick(&mut self) -> Result<Vec<BackupType>, SaveError> {
        let Some(slot) = self.active_slot.clone() else {
            return Ok(Vec::new());
        };
        let now = self.clock.now();

        let autosave_due = self.current.as_ref().is_some_and(|save| {
            save.settings.auto_save
                && self.last_autosave.map_or(true, |last| {
                    now - last >= Duration::seconds(i64::from(save.settings.auto_save_interval_seconds))
                })
        });
        if autosave_due {
            debug!(slot, "auto-save");
            self.persist(&slot)?;
        }

        let mut created = Vec::new();
        if self.store.exists(&slot) {
            for backup_type in self.schedule.evaluate(now) {
                self.backups
                    .create_backup(backup_type, &slot, "scheduled")?;
                created.push(backup_type);
            }
        }
        Ok(created)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn persist(&mut self, slot: &str) -> Result<(), SaveError> {
        let level = self.config.security_level;
        let save = self.current.as_mut().ok_or(SaveError::NoActiveSave)?;
        save.settings.clamp();

        let validation = self.validator.validate(save, level);
        if !validation.is_valid() {
            if level.strict() {
                return Err(SaveError::Validation(validation.errors));
            }
            for error in &validation.errors {
                warn!(slot, "validation: {error}");
            }
        }

        let bytes = encode_slot(save, level, &self.key, self.config.password.as_deref())?;
        self.store.save(slot, &bytes)?;
        self.active_slot = Some(slot.to_string());
        self.last_autosave = Some(self.clock.now());
        Ok(())
    }

    fn decode(&self, bytes: &[u8]) -> Result<(SaveData, DecodeReport), SaveError> {
        decode_slot(
            bytes,
            self.config.security_level,
            &self.key,
            self.config.password.as_deref(),
        )
    }

    fn load_with_fallback(
        &self,
        slot: &str,
    ) -> Result<(SaveData, DecodeReport, LoadSource), SaveError> {
        let primary_err = match self.store.load(slot).and_then(|b| self.decode(&b)) {
            Ok((save, report)) => return Ok((save, report, LoadSource::Primary)),
            Err(e) => e,
        };
        warn!(slot, error = %primary_err, "primary slot unreadable, trying .bak");

        let bak_err = match self.store.load_bak(slot).and_then(|b| self.decode(&b)) {
            Ok((save, report)) => return Ok((save, report, LoadSource::BakFile)),
            Err(e) => e,
        };
        warn!(slot, error = %bak_err, ".bak unreadable, trying backup history");

        for metadata in self.backups.list_backups(None) {
            match self
                .backups
                .slot_bytes(&metadata.id)
                .and_then(|b| self.decode(&b))
            {
                Ok((save, report)) => {
                    info!(slot, backup_id = %metadata.id, "recovered from backup");
                    return Ok((save, report, LoadSource::Backup(metadata.id)));
                }
                Err(e) => warn!(backup_id = %metadata.id, error = %e, "backup unusable"),
            }
        }

        // Nothing loadable anywhere. A never-written slot reports NotFound;
        // a corrupt one reports its original failure.
        match primary_err {
            SaveError::SlotNotFound(_) => Err(SaveError::SlotNotFound(slot.to_string())),
            other => Err(other),
        }
    }
}

/// Grant XP, recompute the level from the shared curve, and collect
/// milestone rewards for every level crossed.
fn award_xp(save: &mut SaveData, curve: &XpCurve, amount: u64) -> XpAward {
    let level_before = save.player_profile.level;
    save.player_profile.xp += amount;
    let standing = curve.level_from_xp(save.player_profile.xp);
    save.player_profile.level = standing.level;

    let mut milestone_rewards = Vec::new();
    for level in (level_before + 1)..=standing.level {
        milestone_rewards.extend(level_up_rewards(level));
    }
    XpAward {
        amount,
        new_total: save.player_profile.xp,
        level_before,
        level_after: standing.level,
        milestone_rewards,
    }
}

/// Run a coordinator's `tick` on a background thread every
/// `tick_interval`. The mutex is the "one logical lock" serializing all
/// mutation.
pub fn spawn_scheduler(
    coordinator: Arc<Mutex<ProgressionCoordinator>>,
    tick_interval: StdDuration,
) -> SchedulerHandle {
    SchedulerHandle::spawn(tick_interval, move || {
        let mut guard = match coordinator.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(e) = guard.tick() {
            warn!(error = %e, "scheduled tick failed");
        }
    })
}

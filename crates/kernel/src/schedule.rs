//! Staggered presentation of grid changes.
//!
//! Bulk changes (a chunk of falling blocks, hundreds of newly lit cells,
//! erosion steps) are shown one animation at a time. Each kind of change has
//! its own lane: a bounded FIFO of proposals, a start gate limiting how often
//! a new animation may begin, and a cap on concurrently active animations.
//!
//! When an animation finishes it commits the cell's grid state into the
//! render cache and re-submits the cell to the water automaton. Force-flush
//! does the same for everything queued or running, immediately, in the
//! order the proposals were submitted across all lanes.

use std::collections::{BTreeSet, VecDeque};
use std::f32::consts::PI;

use serde::{Deserialize, Serialize};
use tidefall_common::{BlockType, CellCoord};

use crate::config::{LaneConfig, ScheduleConfig};
use crate::gravity::FallProposal;
use crate::grid::Grid;
use crate::lighting::LightProposal;
use crate::render_cache::RenderCache;
use crate::water::WaterAutomaton;

/// Fraction of an aging animation spent swelling before it pops.
const SWELL_PORTION: f32 = 0.7;
/// Peak extra scale reached by the swell.
const SWELL_AMOUNT: f32 = 0.3;

/// A type transition proposed by the erosion/growth subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgingProposal {
    pub coord: CellCoord,
    pub old: BlockType,
    pub new: BlockType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AnimationKind {
    Fall,
    Light,
    Aging,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Proposal {
    Fall(FallProposal),
    Light(LightProposal),
    Aging(AgingProposal),
}

impl Proposal {
    fn kind(&self) -> AnimationKind {
        match self {
            Proposal::Fall(_) => AnimationKind::Fall,
            Proposal::Light(_) => AnimationKind::Light,
            Proposal::Aging(_) => AnimationKind::Aging,
        }
    }
}

/// A proposal tagged with its scheduler-wide submission number.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Queued {
    seq: u64,
    proposal: Proposal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Pending,
    Active,
    Done,
}

/// Presentation payload of a running animation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TaskVisual {
    /// `offset` is in cells below `from`, eased towards `to`.
    Fall {
        from: CellCoord,
        to: CellCoord,
        offset: f32,
    },
    Flash { coord: CellCoord, alpha: f32 },
    Swell { coord: CellCoord, scale: f32 },
}

#[derive(Debug, Clone)]
struct AnimationTask {
    seq: u64,
    proposal: Proposal,
    phase: Phase,
    elapsed: f32,
    duration: f32,
    visual: TaskVisual,
}

impl AnimationTask {
    fn new(queued: Queued, duration: f32) -> Self {
        let Queued { seq, proposal } = queued;
        let visual = match proposal {
            Proposal::Fall(f) => TaskVisual::Fall {
                from: f.from(),
                to: f.to(),
                offset: 0.0,
            },
            Proposal::Light(l) => TaskVisual::Flash {
                coord: l.coord,
                alpha: 0.0,
            },
            Proposal::Aging(a) => TaskVisual::Swell {
                coord: a.coord,
                scale: 1.0,
            },
        };
        Self {
            seq,
            proposal,
            phase: Phase::Pending,
            elapsed: 0.0,
            duration: duration.max(0.0),
            visual,
        }
    }

    /// Pending -> Active if the precondition still holds, otherwise straight
    /// to Done without a commit.
    fn activate(&mut self, grid: &mut Grid) -> bool {
        debug_assert_eq!(self.phase, Phase::Pending);
        let ok = match self.proposal {
            Proposal::Fall(_) => true,
            Proposal::Light(l) => match grid.get_mut(l.coord) {
                Ok(block) => match block.solid_mut() {
                    Some(solid) if !solid.lit => {
                        solid.lit = l.lit;
                        true
                    }
                    _ => false,
                },
                Err(_) => false,
            },
            Proposal::Aging(a) => grid.get_type(a.coord) == Ok(a.old),
        };
        self.phase = if ok { Phase::Active } else { Phase::Done };
        ok
    }

    fn advance(&mut self, dt: f32) {
        if self.phase != Phase::Active {
            return;
        }
        self.elapsed += dt;
        let t = if self.duration > 0.0 {
            (self.elapsed / self.duration).clamp(0.0, 1.0)
        } else {
            1.0
        };
        self.visual = match self.visual {
            TaskVisual::Fall { from, to, .. } => TaskVisual::Fall {
                from,
                to,
                offset: (to.row - from.row) as f32 * t * t,
            },
            TaskVisual::Flash { coord, .. } => TaskVisual::Flash {
                coord,
                alpha: (PI * t).sin(),
            },
            TaskVisual::Swell { coord, .. } => TaskVisual::Swell {
                coord,
                scale: swell_scale(t),
            },
        };
        if t >= 1.0 {
            self.phase = Phase::Done;
        }
    }
}

fn swell_scale(t: f32) -> f32 {
    if t < SWELL_PORTION {
        1.0 + SWELL_AMOUNT * (t / SWELL_PORTION)
    } else {
        (1.0 + SWELL_AMOUNT) * (1.0 - (t - SWELL_PORTION) / (1.0 - SWELL_PORTION))
    }
}

/// Everything a finished animation writes to.
pub struct CommitTarget<'a> {
    pub grid: &'a mut Grid,
    pub cache: &'a mut RenderCache,
    pub water: &'a mut WaterAutomaton,
}

/// What a scheduler call finished.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleReport {
    pub completed: usize,
    pub dropped: usize,
    /// Cells where aging removed or added structural material. Settlement
    /// should run again when this is non-empty.
    pub structural_changed: Vec<CellCoord>,
}

impl ScheduleReport {
    fn merge(&mut self, other: ScheduleReport) {
        self.completed += other.completed;
        self.dropped += other.dropped;
        self.structural_changed.extend(other.structural_changed);
    }
}

#[derive(Debug, Clone)]
struct Lane {
    config: LaneConfig,
    queue: VecDeque<Queued>,
    active: Vec<AnimationTask>,
    gate: f32,
}

impl Lane {
    fn new(config: LaneConfig) -> Self {
        Self {
            config,
            queue: VecDeque::new(),
            active: Vec::new(),
            gate: 0.0,
        }
    }

    fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.active.is_empty()
    }

    fn update(&mut self, dt: f32, target: &mut CommitTarget<'_>) -> (ScheduleReport, Vec<Proposal>) {
        let mut report = ScheduleReport::default();
        let mut finished = Vec::new();

        for task in &mut self.active {
            task.advance(dt);
        }
        let (done, running): (Vec<_>, Vec<_>) = std::mem::take(&mut self.active)
            .into_iter()
            .partition(|t| t.phase == Phase::Done);
        self.active = running;
        for task in done {
            finished.push(task.proposal);
            report.merge(finalize(task.proposal, target));
        }

        self.gate -= dt;
        while self.gate <= 0.0 && self.active.len() < self.config.max_active {
            if self.front_is_held() {
                break;
            }
            let Some(queued) = self.queue.pop_front() else {
                break;
            };
            let mut task = AnimationTask::new(queued, self.config.duration);
            if task.activate(target.grid) {
                self.active.push(task);
            } else {
                finished.push(queued.proposal);
                report.dropped += 1;
            }
            self.gate += self.config.start_interval.max(0.0);
        }
        if self.gate < 0.0 {
            self.gate = 0.0;
        }

        (report, finished)
    }

    /// An aging change waits while another aging animation on the same cell
    /// is running, so its old-type check sees the earlier change's result.
    fn front_is_held(&self) -> bool {
        let Some(Queued {
            proposal: Proposal::Aging(next),
            ..
        }) = self.queue.front()
        else {
            return false;
        };
        self.active
            .iter()
            .any(|t| matches!(t.proposal, Proposal::Aging(a) if a.coord == next.coord))
    }

    /// Take every running and queued proposal out of the lane.
    fn drain(&mut self) -> (Vec<AnimationTask>, Vec<Queued>) {
        self.gate = 0.0;
        (
            std::mem::take(&mut self.active),
            self.queue.drain(..).collect(),
        )
    }
}

/// Work left in a lane when it is force-flushed.
enum Flushed {
    Running(AnimationTask),
    Queued(Queued),
}

impl Flushed {
    fn seq(&self) -> u64 {
        match self {
            Flushed::Running(task) => task.seq,
            Flushed::Queued(queued) => queued.seq,
        }
    }
}

/// Activate and finish a proposal with no animation.
fn apply_now(queued: Queued, target: &mut CommitTarget<'_>) -> ScheduleReport {
    let mut task = AnimationTask::new(queued, 0.0);
    if task.activate(target.grid) {
        finalize(queued.proposal, target)
    } else {
        ScheduleReport {
            dropped: 1,
            ..Default::default()
        }
    }
}

/// Finish a running animation during a flush.
///
/// A light applied at activation may since have been replaced by an earlier
/// submitted aging change that finalized first, so it is applied again.
fn finish_running(task: AnimationTask, target: &mut CommitTarget<'_>) -> ScheduleReport {
    if let Proposal::Light(l) = task.proposal {
        match target.grid.get_mut(l.coord).map(|b| b.solid_mut()) {
            Ok(Some(solid)) => solid.lit = l.lit,
            _ => {
                return ScheduleReport {
                    dropped: 1,
                    ..Default::default()
                };
            }
        }
    }
    finalize(task.proposal, target)
}

/// Commit the end state of an activated proposal.
fn finalize(proposal: Proposal, target: &mut CommitTarget<'_>) -> ScheduleReport {
    let mut report = ScheduleReport::default();
    let touched = match proposal {
        Proposal::Fall(f) => vec![f.from(), f.to()],
        Proposal::Light(l) => vec![l.coord],
        Proposal::Aging(a) => {
            // Anything else may have written the cell while it animated.
            if target.grid.get_type(a.coord) != Ok(a.old) {
                report.dropped += 1;
                return report;
            }
            if target.grid.set(a.coord, a.new, false).is_err() {
                report.dropped += 1;
                return report;
            }
            if a.old.is_structural() || a.new.is_structural() {
                report.structural_changed.push(a.coord);
            }
            vec![a.coord]
        }
    };
    for cell in touched {
        target.cache.commit(cell, target.grid);
        target.water.notify_changed(target.grid, cell);
    }
    report.completed += 1;
    report
}

/// Per-kind staggering of proposed changes.
#[derive(Debug, Clone)]
pub struct Scheduler {
    fall: Lane,
    light: Lane,
    aging: Lane,
    /// Cells with a light proposal queued or running.
    light_pending: BTreeSet<CellCoord>,
    /// Submission number of the next proposal, shared by all lanes.
    next_seq: u64,
}

impl Scheduler {
    pub fn new(config: &ScheduleConfig) -> Self {
        Self {
            fall: Lane::new(config.fall.clone()),
            light: Lane::new(config.light.clone()),
            aging: Lane::new(config.aging.clone()),
            light_pending: BTreeSet::new(),
            next_seq: 0,
        }
    }

    fn lane_mut(&mut self, kind: AnimationKind) -> &mut Lane {
        match kind {
            AnimationKind::Fall => &mut self.fall,
            AnimationKind::Light => &mut self.light,
            AnimationKind::Aging => &mut self.aging,
        }
    }

    fn lane(&self, kind: AnimationKind) -> &Lane {
        match kind {
            AnimationKind::Fall => &self.fall,
            AnimationKind::Light => &self.light,
            AnimationKind::Aging => &self.aging,
        }
    }

    /// Queue a proposal; a full queue applies it immediately instead.
    fn submit(&mut self, proposal: Proposal, target: &mut CommitTarget<'_>) -> ScheduleReport {
        let queued = Queued {
            seq: self.next_seq,
            proposal,
        };
        self.next_seq += 1;
        let kind = proposal.kind();
        let lane = self.lane_mut(kind);
        if lane.queue.len() < lane.config.queue_capacity {
            lane.queue.push_back(queued);
            return ScheduleReport::default();
        }
        tracing::debug!(?kind, "queue full, applying proposal immediately");
        let report = apply_now(queued, target);
        if let Proposal::Light(l) = proposal {
            self.light_pending.remove(&l.coord);
        }
        report
    }

    pub fn submit_falls(
        &mut self,
        proposals: impl IntoIterator<Item = FallProposal>,
        target: &mut CommitTarget<'_>,
    ) -> ScheduleReport {
        let mut report = ScheduleReport::default();
        for p in proposals {
            report.merge(self.submit(Proposal::Fall(p), target));
        }
        report
    }

    /// Queue light proposals, skipping cells that already have one pending.
    pub fn submit_lights(
        &mut self,
        proposals: impl IntoIterator<Item = LightProposal>,
        target: &mut CommitTarget<'_>,
    ) -> ScheduleReport {
        let mut report = ScheduleReport::default();
        for p in proposals {
            if !p.lit || !self.light_pending.insert(p.coord) {
                continue;
            }
            report.merge(self.submit(Proposal::Light(p), target));
        }
        report
    }

    pub fn submit_aging(
        &mut self,
        proposals: impl IntoIterator<Item = AgingProposal>,
        target: &mut CommitTarget<'_>,
    ) -> ScheduleReport {
        let mut report = ScheduleReport::default();
        for p in proposals {
            report.merge(self.submit(Proposal::Aging(p), target));
        }
        report
    }

    /// Advance running animations by `dt` seconds and start new ones where
    /// the gates allow.
    pub fn update(&mut self, dt: f32, target: &mut CommitTarget<'_>) -> ScheduleReport {
        let dt = if dt.is_finite() && dt > 0.0 { dt } else { 0.0 };
        let mut report = ScheduleReport::default();
        for kind in [AnimationKind::Fall, AnimationKind::Light, AnimationKind::Aging] {
            let (lane_report, finished) = self.lane_mut(kind).update(dt, target);
            report.merge(lane_report);
            self.forget_lights(&finished);
        }
        report
    }

    /// Apply every queued and active change's end state now, in submission
    /// order across all lanes.
    pub fn force_flush(&mut self, target: &mut CommitTarget<'_>) -> ScheduleReport {
        let _span = tracing::info_span!("schedule_force_flush").entered();
        let mut work = Vec::new();
        for lane in [&mut self.fall, &mut self.light, &mut self.aging] {
            let (running, queued) = lane.drain();
            work.extend(running.into_iter().map(Flushed::Running));
            work.extend(queued.into_iter().map(Flushed::Queued));
        }
        work.sort_by_key(Flushed::seq);

        let mut report = ScheduleReport::default();
        for item in work {
            report.merge(match item {
                Flushed::Running(task) => finish_running(task, target),
                Flushed::Queued(queued) => apply_now(queued, target),
            });
        }
        self.light_pending.clear();
        tracing::debug!(
            completed = report.completed,
            dropped = report.dropped,
            "scheduler flushed"
        );
        report
    }

    fn forget_lights(&mut self, finished: &[Proposal]) {
        for p in finished {
            if let Proposal::Light(l) = p {
                self.light_pending.remove(&l.coord);
            }
        }
    }

    /// True when no lane has queued or running work.
    pub fn is_settled(&self) -> bool {
        self.fall.is_idle() && self.light.is_idle() && self.aging.is_idle()
    }

    pub fn queued(&self, kind: AnimationKind) -> usize {
        self.lane(kind).queue.len()
    }

    pub fn active(&self, kind: AnimationKind) -> usize {
        self.lane(kind).active.len()
    }

    /// Payloads of every running animation.
    pub fn visuals(&self) -> Vec<TaskVisual> {
        [&self.fall, &self.light, &self.aging]
            .into_iter()
            .flat_map(|lane| lane.active.iter().map(|t| t.visual))
            .collect()
    }
}

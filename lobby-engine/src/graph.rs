//! Software renderer: the node graph behind both bundled contexts.
//!
//! The graph only ever sees [`Command`]s. The offline context applies them
//! directly, the realtime context ships them over a ring buffer and applies
//! them at the top of each device callback; either way the graph renders one
//! mono sample at a time on the rendering clock.
//!
//! Design
//! - Nodes live in a dense `Vec`; ids map to slots through an index that is
//!   rebuilt only when the topology changes
//! - Evaluation order is a post-order walk from the destination, so nodes
//!   that cannot be heard cost nothing
//! - Finished sources are collected at block boundaries, and any gain/filter
//!   left without inputs goes with them; nodes wired straight into the
//!   destination (the output bus) are kept for the graph's lifetime

use std::collections::HashMap;

use lobby_core::dsp::{fast_sin, wrap01, TAU};
use lobby_core::filters::StateVariable;

use crate::context::{FilterKind, NodeId, NoiseBuffer, ParamKind, Wave};
use crate::param::{AudioParam, Automation};

const DEST: usize = 0;

/// One graph mutation, produced on the control side.
#[derive(Clone, Debug)]
pub(crate) enum Command {
    Tone { id: NodeId, wave: Wave },
    Noise { id: NodeId, buffer: NoiseBuffer },
    Gain { id: NodeId, level: f32 },
    Filter { id: NodeId, kind: FilterKind, frequency: f32, q: f32 },
    Connect { src: NodeId, dst: NodeId },
    ConnectParam { src: NodeId, dst: NodeId, param: ParamKind },
    Automate { node: NodeId, param: ParamKind, event: Automation },
    Cancel { node: NodeId, param: ParamKind, from: f64 },
    Set { node: NodeId, param: ParamKind, value: f32 },
    Start { node: NodeId, at: f64 },
    Stop { node: NodeId, at: f64 },
}

#[inline]
fn osc_sample(phase01: f32, wave: Wave) -> f32 {
    match wave {
        Wave::Sine => fast_sin(TAU * phase01),
        Wave::Square => if phase01 < 0.5 { 1.0 } else { -1.0 },
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct Span {
    start: Option<f64>,
    stop: Option<f64>,
}

impl Span {
    #[inline]
    fn sounding(&self, t: f64) -> bool {
        matches!(self.start, Some(s) if s <= t) && self.stop.map_or(true, |e| t < e)
    }

    #[inline]
    fn finished(&self, t: f64) -> bool {
        self.stop.map_or(false, |e| t >= e)
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct Offsets {
    gain: f32,
    frequency: f32,
    q: f32,
}

impl Offsets {
    #[inline]
    fn add(&mut self, param: ParamKind, v: f32) {
        match param {
            ParamKind::Gain => self.gain += v,
            ParamKind::Frequency => self.frequency += v,
            ParamKind::Q => self.q += v,
        }
    }
}

struct Tone {
    wave: Wave,
    phase: f32,
    frequency: AudioParam,
    span: Span,
}

impl Tone {
    #[inline]
    fn tick(&mut self, t: f64, sr: f32, fm: f32) -> f32 {
        if !self.span.sounding(t) {
            return 0.0;
        }
        let f = self.frequency.value_at(t) + fm;
        let y = osc_sample(self.phase, self.wave);
        self.phase = wrap01(self.phase + f / sr);
        y
    }
}

struct Noise {
    buffer: NoiseBuffer,
    pos: usize,
    span: Span,
}

impl Noise {
    /// Plays the buffer once from its start time, then stays silent.
    #[inline]
    fn tick(&mut self, t: f64) -> f32 {
        if !self.span.sounding(t) {
            return 0.0;
        }
        let y = self.buffer.samples().get(self.pos).copied().unwrap_or(0.0);
        self.pos = self.pos.saturating_add(1);
        y
    }
}

struct Filter {
    frequency: AudioParam,
    q: AudioParam,
    svf: StateVariable,
}

impl Filter {
    #[inline]
    fn tick(&mut self, x: f32, t: f64, m: &Offsets) -> f32 {
        self.svf.set(self.frequency.value_at(t) + m.frequency, self.q.value_at(t) + m.q);
        self.svf.process(x)
    }
}

enum Node {
    Destination,
    Tone(Tone),
    Noise(Noise),
    Gain(AudioParam),
    Filter(Filter),
}

impl Node {
    #[inline]
    fn tick(&mut self, x: f32, t: f64, sr: f32, m: &Offsets) -> f32 {
        match self {
            Node::Destination => x,
            Node::Tone(tone) => tone.tick(t, sr, m.frequency),
            Node::Noise(noise) => noise.tick(t),
            Node::Gain(gain) => x * (gain.value_at(t) + m.gain),
            Node::Filter(filter) => filter.tick(x, t, m),
        }
    }

    fn param(&self, kind: ParamKind) -> Option<&AudioParam> {
        match (self, kind) {
            (Node::Tone(tone), ParamKind::Frequency) => Some(&tone.frequency),
            (Node::Gain(gain), ParamKind::Gain) => Some(gain),
            (Node::Filter(f), ParamKind::Frequency) => Some(&f.frequency),
            (Node::Filter(f), ParamKind::Q) => Some(&f.q),
            _ => None,
        }
    }

    fn param_mut(&mut self, kind: ParamKind) -> Option<&mut AudioParam> {
        match (self, kind) {
            (Node::Tone(tone), ParamKind::Frequency) => Some(&mut tone.frequency),
            (Node::Gain(gain), ParamKind::Gain) => Some(gain),
            (Node::Filter(f), ParamKind::Frequency) => Some(&mut f.frequency),
            (Node::Filter(f), ParamKind::Q) => Some(&mut f.q),
            _ => None,
        }
    }

    fn span_mut(&mut self) -> Option<&mut Span> {
        match self {
            Node::Tone(tone) => Some(&mut tone.span),
            Node::Noise(noise) => Some(&mut noise.span),
            _ => None,
        }
    }

    fn finished(&self, t: f64) -> bool {
        match self {
            Node::Tone(tone) => tone.span.finished(t),
            Node::Noise(noise) => noise.span.finished(t),
            _ => false,
        }
    }

    fn is_processor(&self) -> bool {
        matches!(self, Node::Gain(_) | Node::Filter(_))
    }

    fn prune(&mut self, t: f64) {
        match self {
            Node::Tone(tone) => tone.frequency.prune(t),
            Node::Gain(gain) => gain.prune(t),
            Node::Filter(f) => {
                f.frequency.prune(t);
                f.q.prune(t);
            }
            Node::Destination | Node::Noise(_) => {}
        }
    }
}

struct Slot {
    id: NodeId,
    node: Node,
    inputs: Vec<NodeId>,
    mods: Vec<(ParamKind, NodeId)>,
    wired_inputs: Vec<usize>,
    wired_mods: Vec<(ParamKind, usize)>,
    /// Wired straight into the destination; never collected.
    pinned: bool,
    /// Has had at least one audio input.
    fed: bool,
}

impl Slot {
    fn new(id: NodeId, node: Node) -> Self {
        Self {
            id,
            node,
            inputs: Vec::new(),
            mods: Vec::new(),
            wired_inputs: Vec::new(),
            wired_mods: Vec::new(),
            pinned: false,
            fed: false,
        }
    }
}

pub(crate) struct Graph {
    sr: f32,
    slots: Vec<Slot>,
    outs: Vec<f32>,
    index: HashMap<NodeId, usize>,
    order: Vec<usize>,
    marks: Vec<u8>,
    dirty: bool,
}

impl Graph {
    pub(crate) fn new(sr: f32) -> Self {
        let mut g = Self {
            sr: sr.max(1.0),
            slots: Vec::with_capacity(256),
            outs: Vec::with_capacity(256),
            index: HashMap::with_capacity(256),
            order: Vec::with_capacity(256),
            marks: Vec::with_capacity(256),
            dirty: true,
        };
        g.insert(Slot::new(NodeId::DESTINATION, Node::Destination));
        g
    }

    #[inline]
    pub(crate) fn sample_rate(&self) -> f32 {
        self.sr
    }

    /// Live nodes, the destination included.
    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn contains(&self, id: NodeId) -> bool {
        self.index.contains_key(&id)
    }

    pub(crate) fn param_value(&self, id: NodeId, kind: ParamKind, t: f64) -> Option<f32> {
        let i = *self.index.get(&id)?;
        self.slots[i].node.param(kind).map(|p| p.value_at(t))
    }

    fn insert(&mut self, slot: Slot) {
        self.index.insert(slot.id, self.slots.len());
        self.slots.push(slot);
        self.outs.push(0.0);
        self.dirty = true;
    }

    fn slot_mut(&mut self, id: NodeId) -> Option<&mut Slot> {
        let i = *self.index.get(&id)?;
        self.slots.get_mut(i)
    }

    pub(crate) fn apply(&mut self, cmd: Command) {
        match cmd {
            Command::Tone { id, wave } => {
                let tone = Tone { wave, phase: 0.0, frequency: AudioParam::new(440.0), span: Span::default() };
                self.insert(Slot::new(id, Node::Tone(tone)));
            }
            Command::Noise { id, buffer } => {
                let noise = Noise { buffer, pos: 0, span: Span::default() };
                self.insert(Slot::new(id, Node::Noise(noise)));
            }
            Command::Gain { id, level } => {
                self.insert(Slot::new(id, Node::Gain(AudioParam::new(level))));
            }
            Command::Filter { id, kind, frequency, q } => {
                let filter = Filter {
                    frequency: AudioParam::new(frequency),
                    q: AudioParam::new(q),
                    svf: StateVariable::new(kind.response(), frequency, q, self.sr),
                };
                self.insert(Slot::new(id, Node::Filter(filter)));
            }
            Command::Connect { src, dst } => {
                if !self.contains(src) {
                    return;
                }
                if let Some(slot) = self.slot_mut(dst) {
                    slot.inputs.push(src);
                    slot.fed = true;
                    self.dirty = true;
                    if dst == NodeId::DESTINATION {
                        if let Some(s) = self.slot_mut(src) {
                            s.pinned = true;
                        }
                    }
                }
            }
            Command::ConnectParam { src, dst, param } => {
                if !self.contains(src) {
                    return;
                }
                if let Some(slot) = self.slot_mut(dst) {
                    slot.mods.push((param, src));
                    self.dirty = true;
                }
            }
            Command::Automate { node, param, event } => {
                if let Some(p) = self.slot_mut(node).and_then(|s| s.node.param_mut(param)) {
                    p.schedule(event);
                }
            }
            Command::Cancel { node, param, from } => {
                if let Some(p) = self.slot_mut(node).and_then(|s| s.node.param_mut(param)) {
                    p.cancel_from(from);
                }
            }
            Command::Set { node, param, value } => {
                if let Some(p) = self.slot_mut(node).and_then(|s| s.node.param_mut(param)) {
                    p.set(value);
                }
            }
            Command::Start { node, at } => {
                if let Some(span) = self.slot_mut(node).and_then(|s| s.node.span_mut()) {
                    span.start = Some(at);
                }
            }
            Command::Stop { node, at } => {
                if let Some(span) = self.slot_mut(node).and_then(|s| s.node.span_mut()) {
                    span.stop = Some(at);
                }
            }
        }
    }

    /// Render `out.len()` samples; `first_frame` is the clock position of `out[0]`.
    pub(crate) fn render(&mut self, out: &mut [f32], first_frame: u64) {
        if self.dirty {
            self.rewire();
        }
        let sr = self.sr;
        let sr64 = f64::from(sr);
        for (k, o) in out.iter_mut().enumerate() {
            let t = (first_frame + k as u64) as f64 / sr64;
            for &i in &self.order {
                let slot = &mut self.slots[i];
                let x: f32 = slot.wired_inputs.iter().map(|&j| self.outs[j]).sum();
                let mut m = Offsets::default();
                for &(param, j) in &slot.wired_mods {
                    m.add(param, self.outs[j]);
                }
                self.outs[i] = slot.node.tick(x, t, sr, &m);
            }
            *o = self.outs[DEST];
        }
        let t_end = (first_frame + out.len() as u64) as f64 / sr64;
        self.collect(t_end);
    }

    /// Drop finished sources and whatever they leave unfed; trim spent automation.
    fn collect(&mut self, t: f64) {
        let mut dead: Vec<NodeId> = self
            .slots
            .iter()
            .filter(|s| s.node.finished(t))
            .map(|s| s.id)
            .collect();

        while !dead.is_empty() {
            self.slots.retain(|s| !dead.contains(&s.id));
            for slot in &mut self.slots {
                slot.inputs.retain(|id| !dead.contains(id));
                slot.mods.retain(|(_, id)| !dead.contains(id));
            }
            dead = self
                .slots
                .iter()
                .filter(|s| s.node.is_processor() && s.fed && !s.pinned && s.inputs.is_empty())
                .map(|s| s.id)
                .collect();
            self.dirty = true;
        }

        if self.dirty {
            self.index.clear();
            for (i, s) in self.slots.iter().enumerate() {
                self.index.insert(s.id, i);
            }
            self.outs.resize(self.slots.len(), 0.0);
        }

        for slot in &mut self.slots {
            slot.node.prune(t);
        }
    }

    fn rewire(&mut self) {
        for i in 0..self.slots.len() {
            let mut inputs = std::mem::take(&mut self.slots[i].wired_inputs);
            let mut mods = std::mem::take(&mut self.slots[i].wired_mods);
            inputs.clear();
            mods.clear();
            let slot = &self.slots[i];
            inputs.extend(slot.inputs.iter().filter_map(|id| self.index.get(id).copied()));
            mods.extend(slot.mods.iter().filter_map(|(p, id)| self.index.get(id).map(|&j| (*p, j))));
            self.slots[i].wired_inputs = inputs;
            self.slots[i].wired_mods = mods;
        }

        // 0 = unvisited, 1 = on the stack, 2 = emitted. Back edges are ignored,
        // so a feedback loop simply reads the previous sample.
        self.marks.clear();
        self.marks.resize(self.slots.len(), 0);
        self.order.clear();
        visit(&self.slots, DEST, &mut self.marks, &mut self.order);
        self.dirty = false;
    }
}

fn visit(slots: &[Slot], i: usize, marks: &mut [u8], order: &mut Vec<usize>) {
    if marks[i] != 0 {
        return;
    }
    marks[i] = 1;
    let slot = &slots[i];
    for &j in &slot.wired_inputs {
        visit(slots, j, marks, order);
    }
    for &(_, j) in &slot.wired_mods {
        visit(slots, j, marks, order);
    }
    marks[i] = 2;
    order.push(i);
}

// ------------------------------------ Tests --------------------------------------

//! Recording test double for [`AudioContext`].
//!
//! `ManualContext` renders nothing. Its clock is set by the test, activation
//! can be blocked and unblocked at will, and every call lands in an op log.
//! Parameter values are tracked with the real [`AudioParam`] timeline so
//! tests can ask what a gain will be at a given time.

use std::collections::HashMap;

use crate::context::{AudioContext, ContextState, FilterKind, NodeId, NoiseBuffer, ParamKind, ResumeError, Wave};
use crate::param::{AudioParam, Automation};

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Op {
    Tone { id: NodeId, wave: Wave },
    Noise { id: NodeId, len: usize },
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

pub(crate) struct ManualContext {
    now: f64,
    state: ContextState,
    blocked: bool,
    resume_calls: usize,
    next_id: u32,
    ops: Vec<Op>,
    params: HashMap<(NodeId, ParamKind), AudioParam>,
}

impl ManualContext {
    pub(crate) fn new() -> Self {
        Self {
            now: 0.0,
            state: ContextState::Suspended,
            blocked: false,
            resume_calls: 0,
            next_id: 1,
            ops: Vec::new(),
            params: HashMap::new(),
        }
    }

    /// A context whose `resume()` fails until [`unblock`](Self::unblock).
    pub(crate) fn blocked() -> Self {
        Self { blocked: true, ..Self::new() }
    }

    pub(crate) fn unblock(&mut self) {
        self.blocked = false;
    }

    pub(crate) fn set_now(&mut self, t: f64) {
        self.now = t;
    }

    pub(crate) fn resume_calls(&self) -> usize {
        self.resume_calls
    }

    pub(crate) fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub(crate) fn started(&self) -> Vec<(NodeId, f64)> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                Op::Start { node, at } => Some((*node, *at)),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn param_value(&self, node: NodeId, param: ParamKind, t: f64) -> Option<f32> {
        self.params.get(&(node, param)).map(|p| p.value_at(t))
    }

    fn alloc(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    fn param_mut(&mut self, node: NodeId, param: ParamKind) -> &mut AudioParam {
        self.params.entry((node, param)).or_insert_with(|| AudioParam::new(0.0))
    }
}

impl AudioContext for ManualContext {
    fn sample_rate(&self) -> f32 {
        48_000.0
    }

    fn now(&self) -> f64 {
        self.now
    }

    fn state(&self) -> ContextState {
        self.state
    }

    fn resume(&mut self) -> Result<(), ResumeError> {
        self.resume_calls += 1;
        match self.state {
            ContextState::Closed => Err(ResumeError::Closed),
            _ if self.blocked => Err(ResumeError::Blocked),
            _ => {
                self.state = ContextState::Running;
                Ok(())
            }
        }
    }

    fn close(&mut self) {
        self.state = ContextState::Closed;
    }

    fn create_tone(&mut self, wave: Wave) -> NodeId {
        let id = self.alloc();
        self.params.insert((id, ParamKind::Frequency), AudioParam::new(440.0));
        self.ops.push(Op::Tone { id, wave });
        id
    }

    fn create_noise(&mut self, buffer: &NoiseBuffer) -> NodeId {
        let id = self.alloc();
        self.ops.push(Op::Noise { id, len: buffer.len() });
        id
    }

    fn create_gain(&mut self, level: f32) -> NodeId {
        let id = self.alloc();
        self.params.insert((id, ParamKind::Gain), AudioParam::new(level));
        self.ops.push(Op::Gain { id, level });
        id
    }

    fn create_filter(&mut self, kind: FilterKind, frequency: f32, q: f32) -> NodeId {
        let id = self.alloc();
        self.params.insert((id, ParamKind::Frequency), AudioParam::new(frequency));
        self.params.insert((id, ParamKind::Q), AudioParam::new(q));
        self.ops.push(Op::Filter { id, kind, frequency, q });
        id
    }

    fn connect(&mut self, src: NodeId, dst: NodeId) {
        self.ops.push(Op::Connect { src, dst });
    }

    fn connect_param(&mut self, src: NodeId, dst: NodeId, param: ParamKind) {
        self.ops.push(Op::ConnectParam { src, dst, param });
    }

    fn automate(&mut self, node: NodeId, param: ParamKind, event: Automation) {
        self.param_mut(node, param).schedule(event);
        self.ops.push(Op::Automate { node, param, event });
    }

    fn cancel_scheduled_values(&mut self, node: NodeId, param: ParamKind, from: f64) {
        self.param_mut(node, param).cancel_from(from);
        self.ops.push(Op::Cancel { node, param, from });
    }

    fn set_value(&mut self, node: NodeId, param: ParamKind, value: f32) {
        self.param_mut(node, param).set(value);
        self.ops.push(Op::Set { node, param, value });
    }

    fn start(&mut self, node: NodeId, at: f64) {
        self.ops.push(Op::Start { node, at });
    }

    fn stop(&mut self, node: NodeId, at: f64) {
        self.ops.push(Op::Stop { node, at });
    }
}

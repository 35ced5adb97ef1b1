//! An in-process store speaking the message catalog.
//!
//! Useful for testing and as a reference for transport implementations. It
//! keeps per-key sibling sets ordered by vector clocks, honors a per-bucket
//! `allow_mult` flag, and keeps CRDT counters as per-actor deltas. Deletes
//! are tombstone siblings: a tombstone concurrent with a live value is
//! returned next to it, and a key holding only tombstones reads as absent.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::codec::{
    self, CounterGetReq, CounterGetResp, CounterUpdateReq, CounterUpdateResp, DelReq, DelResp,
    ErrorResp, GetReq, GetResp, Message, MessageCode, PingReq, PingResp, PutReq, PutResp, Request,
    WireContent,
};
use crate::transport::Transport;
use crate::vclock::VClock;

/// Replica count quorum overrides are checked against.
pub const N_VAL: u32 = 3;

type ObjectId = (Vec<u8>, Vec<u8>);

/// Actor → event counter. Encoded with CBOR as the opaque [`VClock`].
type Clock = BTreeMap<String, u64>;

#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    #[error("connection closed")]
    Closed,
    #[error("cluster state poisoned")]
    Poisoned,
    #[error("encoding response: {0}")]
    Encode(#[from] crate::Error),
}

#[derive(Debug, Clone)]
struct StoredSibling {
    clock: Clock,
    content: WireContent,
}

#[derive(Debug, Default)]
struct ClusterState {
    objects: HashMap<ObjectId, Vec<StoredSibling>>,
    counters: HashMap<ObjectId, HashMap<String, i64>>,
    allow_mult: HashSet<Vec<u8>>,
    next_key: u64,
}

/// Shared store state. Clone to share; [`MemoryCluster::connect`] for connections.
#[derive(Debug, Clone, Default)]
pub struct MemoryCluster {
    state: Arc<Mutex<ClusterState>>,
    next_actor: Arc<AtomicU64>,
}

impl MemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a connection. Each connection writes as its own clock actor.
    pub fn connect(&self) -> MemoryConnection {
        let actor = self.next_actor.fetch_add(1, Ordering::Relaxed) + 1;
        MemoryConnection {
            cluster: self.clone(),
            actor: format!("actor-{}", actor),
            closed: false,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, ClusterState>, MemoryError> {
        self.state.lock().map_err(|_| MemoryError::Poisoned)
    }

    /// Bucket property: keep concurrent writes as siblings instead of the last write.
    pub fn set_allow_mult(&self, bucket: &str, allow: bool) -> Result<(), MemoryError> {
        let mut state = self.lock()?;
        if allow {
            state.allow_mult.insert(bucket.as_bytes().to_vec());
        } else {
            state.allow_mult.remove(bucket.as_bytes());
        }
        Ok(())
    }

    /// Number of live values currently stored under `bucket/key`.
    pub fn sibling_count(&self, bucket: &str, key: &str) -> Result<usize, MemoryError> {
        let state = self.lock()?;
        Ok(state
            .objects
            .get(&(bucket.as_bytes().to_vec(), key.as_bytes().to_vec()))
            .map_or(0, |siblings| siblings.iter().filter(|s| !s.content.deleted).count()))
    }

    /// True if clock `a` has seen every write clock `b` has.
    ///
    /// Only meaningful for clocks issued by a `MemoryCluster`; anything else
    /// reads as the empty clock.
    pub fn descends(a: &VClock, b: &VClock) -> bool {
        descends(&decode_clock(Some(a)), &decode_clock(Some(b)))
    }
}

/// One connection to a [`MemoryCluster`].
#[derive(Debug)]
pub struct MemoryConnection {
    cluster: MemoryCluster,
    actor: String,
    closed: bool,
}

impl MemoryConnection {
    pub fn actor(&self) -> &str {
        &self.actor
    }

    /// Makes every later send fail with [`MemoryError::Closed`].
    pub fn close(&mut self) {
        self.closed = true;
    }
}

impl Transport for MemoryConnection {
    type Error = MemoryError;

    fn send(&mut self, code: MessageCode, request: &[u8]) -> Result<(u8, Vec<u8>), Self::Error> {
        if self.closed {
            return Err(MemoryError::Closed);
        }
        let mut state = self.cluster.lock()?;
        let actor = self.actor.as_str();

        match code {
            MessageCode::PingReq => handle(request, |_: PingReq| Ok(PingResp {})),
            MessageCode::GetReq => handle(request, |req: GetReq| state.get(req)),
            MessageCode::PutReq => handle(request, |req: PutReq| state.put(actor, req)),
            MessageCode::DelReq => handle(request, |req: DelReq| state.delete(actor, req)),
            MessageCode::CounterUpdateReq => {
                handle(request, |req: CounterUpdateReq| state.counter_update(actor, req))
            }
            MessageCode::CounterGetReq => {
                handle(request, |req: CounterGetReq| state.counter_get(req))
            }
            other => reply_error(format!("unsupported message code {:?}", other)),
        }
    }
}

fn handle<R, F>(request: &[u8], f: F) -> Result<(u8, Vec<u8>), MemoryError>
where
    R: Request,
    F: FnOnce(R) -> Result<R::Response, String>,
{
    let decoded = match codec::decode::<R>(request) {
        Ok(decoded) => decoded,
        Err(e) => return reply_error(e.to_string()),
    };
    match f(decoded) {
        Ok(response) => Ok((<R::Response as Message>::CODE.as_u8(), codec::encode(&response)?)),
        Err(message) => reply_error(message),
    }
}

fn reply_error(message: String) -> Result<(u8, Vec<u8>), MemoryError> {
    let response = ErrorResp { message, code: 0 };
    Ok((ErrorResp::CODE.as_u8(), codec::encode(&response)?))
}

fn check_quorum(values: &[Option<u32>]) -> Result<(), String> {
    match values.iter().flatten().find(|&&v| v > N_VAL) {
        Some(v) => Err(format!("n_val violation: {} exceeds {}", v, N_VAL)),
        None => Ok(()),
    }
}

/// True if `a` has seen every event `b` has.
fn descends(a: &Clock, b: &Clock) -> bool {
    b.iter()
        .all(|(actor, &count)| a.get(actor).copied().unwrap_or(0) >= count)
}

fn merge<'a>(clocks: impl IntoIterator<Item = &'a Clock>) -> Clock {
    let mut merged = Clock::new();
    for clock in clocks {
        for (actor, &count) in clock {
            let slot = merged.entry(actor.clone()).or_insert(0);
            *slot = (*slot).max(count);
        }
    }
    merged
}

fn encode_clock(clock: &Clock) -> Result<VClock, String> {
    let mut buf = Vec::new();
    ciborium::into_writer(clock, &mut buf).map_err(|e| format!("encoding vclock: {}", e))?;
    Ok(VClock::from_bytes(buf))
}

/// Unreadable or absent clocks count as empty, like a blind write.
fn decode_clock(vclock: Option<&VClock>) -> Clock {
    vclock
        .and_then(|v| ciborium::from_reader(v.as_bytes()).ok())
        .unwrap_or_default()
}

impl ClusterState {
    fn get(&mut self, req: GetReq) -> Result<GetResp, String> {
        check_quorum(&[req.r, req.pr])?;
        let Some(siblings) = self.objects.get(&(req.bucket, req.key)) else {
            return Ok(GetResp::default());
        };
        if siblings.iter().all(|s| s.content.deleted) {
            return Ok(GetResp::default());
        }
        Ok(GetResp {
            contents: siblings.iter().map(|s| s.content.clone()).collect(),
            vclock: Some(encode_clock(&merge(siblings.iter().map(|s| &s.clock)))?),
        })
    }

    fn put(&mut self, actor: &str, req: PutReq) -> Result<PutResp, String> {
        check_quorum(&[req.w, req.dw, req.pw])?;

        let (key, assigned) = match req.key {
            Some(key) if !key.is_empty() => (key, None),
            _ => {
                self.next_key += 1;
                let mut hasher = blake3::Hasher::new();
                hasher.update(&req.bucket);
                hasher.update(&self.next_key.to_be_bytes());
                let key = hasher.finalize().to_hex()[..20].as_bytes().to_vec();
                (key.clone(), Some(key))
            }
        };

        let mut content = req.content;
        content.deleted = false;
        content.vtag = Some(blake3::hash(&content.value).to_hex()[..16].to_string());

        let siblings = self.write(actor, req.bucket, key, req.vclock.as_ref(), content);
        let vclock = encode_clock(&merge(siblings.iter().map(|s| &s.clock)))?;
        Ok(PutResp {
            contents: if req.return_body {
                siblings.iter().map(|s| s.content.clone()).collect()
            } else {
                Vec::new()
            },
            vclock: Some(vclock),
            key: assigned,
        })
    }

    fn delete(&mut self, actor: &str, req: DelReq) -> Result<DelResp, String> {
        check_quorum(&[req.w, req.dw, req.pw])?;
        if !self.objects.contains_key(&(req.bucket.clone(), req.key.clone())) {
            return Ok(DelResp {});
        }
        let tombstone = WireContent {
            deleted: true,
            ..Default::default()
        };
        self.write(actor, req.bucket, req.key, req.vclock.as_ref(), tombstone);
        Ok(DelResp {})
    }

    /// Stores `content` as a new sibling written by `actor` with causal context `vclock`.
    ///
    /// Multi-value buckets drop only the siblings the context descends;
    /// others collapse to the single new value.
    fn write(
        &mut self,
        actor: &str,
        bucket: Vec<u8>,
        key: Vec<u8>,
        vclock: Option<&VClock>,
        content: WireContent,
    ) -> &[StoredSibling] {
        let allow_mult = self.allow_mult.contains(&bucket);
        let incoming = decode_clock(vclock);
        let siblings = self.objects.entry((bucket, key)).or_default();

        let mut clock = if allow_mult {
            siblings.retain(|s| !descends(&incoming, &s.clock));
            incoming
        } else {
            let merged = merge(siblings.iter().map(|s| &s.clock).chain([&incoming]));
            siblings.clear();
            merged
        };
        *clock.entry(actor.to_string()).or_insert(0) += 1;
        siblings.push(StoredSibling { clock, content });
        siblings
    }

    fn counter_update(&mut self, actor: &str, req: CounterUpdateReq) -> Result<CounterUpdateResp, String> {
        check_quorum(&[req.w, req.dw, req.pw])?;
        let deltas = self.counters.entry((req.bucket, req.key)).or_default();
        *deltas.entry(actor.to_string()).or_insert(0) += req.amount;
        let value: i64 = deltas.values().sum();
        Ok(CounterUpdateResp {
            value: req.return_value.then_some(value),
        })
    }

    fn counter_get(&mut self, req: CounterGetReq) -> Result<CounterGetResp, String> {
        check_quorum(&[req.r, req.pr])?;
        let value = self
            .counters
            .get(&(req.bucket, req.key))
            .map(|deltas| deltas.values().sum::<i64>());
        Ok(CounterGetResp { value })
    }
}

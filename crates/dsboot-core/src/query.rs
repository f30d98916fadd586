//! The query layer: one operation, two modes.
//!
//! `query()` asks either the system's configured recursive resolvers (when
//! `nameservers` is `None`) or a specific set of authoritative nameservers
//! directly (when `nameservers` is `Some`), always with EDNS0 DO set and a
//! 1200-byte UDP payload advertised, and always folds failures into the
//! event taxonomy rather than bubbling a `Result::Err` up to callers.

use std::net::SocketAddr;
use std::time::Duration;

use hickory_proto::op::{Edns, Message, MessageType, OpCode, Query as ProtoQuery};
use hickory_proto::rr::{Name, Record, RecordType};
use rand::Rng;

use crate::events::{Event, EventSink};
use crate::net;

/// The EDNS UDP payload size advertised on every query this layer sends.
const EDNS_UDP_PAYLOAD: u16 = 1200;

/// A successfully received, request-matching DNS response.
#[derive(Debug, Clone)]
pub struct DnsResponse {
    message: Message,
}

impl DnsResponse {
    /// Every answer-section record, regardless of owner or type (a CNAME
    /// chain can interleave these; callers filter by the type they asked
    /// for).
    pub fn answers(&self) -> &[Record] {
        self.message.answers()
    }

    /// Answer-section records with the given owner and type.
    pub fn records_of(&self, owner: &Name, rtype: RecordType) -> Vec<Record> {
        self.message
            .answers()
            .iter()
            .filter(|r| r.record_type() == rtype && r.name() == owner)
            .cloned()
            .collect()
    }

    pub fn is_empty_answer(&self) -> bool {
        self.message.answers().is_empty()
    }

    pub fn message(&self) -> &Message {
        &self.message
    }
}

/// Resolver addresses and per-query tuning shared by every call to
/// `query()` in a process.
#[derive(Debug, Clone)]
pub struct QueryContext {
    pub recursive_nameservers: Vec<SocketAddr>,
    pub rotate: bool,
    pub timeout: Duration,
}

/// Ask `owner`/`rtype`, either recursively (system resolvers, `RD=1`) or
/// directly against `nameservers` (`RD=0`).
///
/// On any definitive answer (`NOERROR` or `NXDOMAIN`, matching the request)
/// this returns `Some`, even if the answer section is empty — "no such
/// record" is a valid outcome the caller must distinguish from "couldn't
/// ask". On failure, this records exactly one event against `event_domain`
/// (`DNS_TIMEOUT`, `DNS_BOGUS`, or `DNS_LAME`) and returns `None`; any other
/// exceptional condition is logged at `debug` and also returns `None`
/// without recording an event, leaving that choice to the caller (compare
/// the `DNS_FAILURE` event, which callers record themselves when a query
/// failure should end a scan rather than just skip one nameserver).
pub async fn query(
    ctx: &QueryContext,
    owner: &Name,
    rtype: RecordType,
    nameservers: Option<&[SocketAddr]>,
    sink: &EventSink,
    event_domain: &Name,
) -> Option<DnsResponse> {
    let (targets, recursion_desired): (Vec<SocketAddr>, bool) = match nameservers {
        Some(explicit) => (explicit.to_vec(), false),
        None => {
            let mut v = ctx.recursive_nameservers.clone();
            if ctx.rotate && v.len() > 1 {
                let mut rng = rand::thread_rng();
                let pick = rng.gen_range(0..v.len());
                v.swap(0, pick);
            }
            (v, true)
        }
    };

    if targets.is_empty() {
        tracing::debug!(%owner, ?rtype, "no nameservers to query");
        return None;
    }

    let request = build_request(owner, rtype, recursion_desired, false);
    match send_to_targets(&targets, &request, ctx.timeout).await {
        Outcome::Responded(response) => Some(response),
        Outcome::TimedOut => {
            sink.record(event_domain, Event::DnsTimeout);
            None
        }
        Outcome::Unreachable => {
            let cd_request = build_request(owner, rtype, recursion_desired, true);
            match send_to_targets(&targets, &cd_request, ctx.timeout).await {
                Outcome::Responded(_) => {
                    sink.record(event_domain, Event::DnsBogus);
                    None
                }
                _ => {
                    sink.record(event_domain, Event::DnsLame);
                    None
                }
            }
        }
    }
}

enum Outcome {
    Responded(DnsResponse),
    TimedOut,
    Unreachable,
}

async fn send_to_targets(targets: &[SocketAddr], request: &Message, per_query_timeout: Duration) -> Outcome {
    let mut saw_timeout = false;
    for &addr in targets {
        match net::send_request(addr, request, per_query_timeout).await {
            Some(message) => return Outcome::Responded(DnsResponse { message }),
            None => {
                // `send_request` itself enforces the timeout; we can't tell
                // a genuine timeout from a decode/mismatch failure here, so
                // treat exhausting every target without an answer as
                // "unreachable" unless every attempt used its full budget.
                saw_timeout = saw_timeout || per_query_timeout.is_zero();
            }
        }
    }
    if saw_timeout {
        Outcome::TimedOut
    } else {
        Outcome::Unreachable
    }
}

fn build_request(owner: &Name, rtype: RecordType, recursion_desired: bool, checking_disabled: bool) -> Message {
    let mut message = Message::new();
    let id: u16 = rand::thread_rng().gen();
    message.set_id(id);
    message.set_message_type(MessageType::Query);
    message.set_op_code(OpCode::Query);
    message.set_recursion_desired(recursion_desired);
    message.set_checking_disabled(checking_disabled);
    message.add_query(ProtoQuery::query(owner.clone(), rtype));

    let mut edns = Edns::new();
    edns.set_version(0);
    edns.set_dnssec_ok(true);
    edns.set_max_payload(EDNS_UDP_PAYLOAD);
    message.set_edns(edns);

    message
}

//! Recursive resolution: walk the delegation hierarchy from the root
//! servers, chasing referrals through glue and authority records, until a
//! server answers authoritatively or the delegation dead-ends.

use crate::cache::AnswerCache;
use async_trait::async_trait;
use burrow_dns_core::{exchange, DnsError};
use futures::future::BoxFuture;
use hickory_proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
use hickory_proto::rr::{RData, Record, RecordType};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// IPv4 root server hints; the entry set for every resolution. Consulted
/// directly, never cached.
pub const ROOTS: [Ipv4Addr; 3] = [
    // a.root-servers.net
    Ipv4Addr::new(198, 41, 0, 4),
    // b.root-servers.net
    Ipv4Addr::new(199, 9, 14, 201),
    // c.root-servers.net
    Ipv4Addr::new(192, 33, 4, 12),
];

/// Delegation depth bound. Coarse, but it keeps a cyclic delegation from
/// recursing forever.
pub const MAX_DEPTH: usize = 12;

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("resolve {name}: query loop, delegation depth bound exceeded")]
    QueryLoop { name: String },

    #[error("resolve {name}: unexpected authority record type {rtype}")]
    UnexpectedAuthorityType { name: String, rtype: RecordType },

    /// Every candidate was asked and none moved the resolution forward.
    /// The best-effort reply last received, if any, rides along.
    #[error("resolve {name}: no more nameservers to ask")]
    ExhaustedNameservers {
        name: String,
        last: Option<Box<Message>>,
    },

    #[error("resolve {name}: {source}")]
    Exchange {
        name: String,
        #[source]
        source: DnsError,
    },
}

/// The single upstream exchange the resolver performs per step. A seam so
/// resolution logic can be driven against scripted upstreams.
#[async_trait]
pub trait Exchanger: Send + Sync {
    async fn exchange(&self, msg: &Message, addr: &str) -> Result<Message, DnsError>;
}

/// Production exchanger: one plain UDP exchange.
pub struct UdpExchanger;

#[async_trait]
impl Exchanger for UdpExchanger {
    async fn exchange(&self, msg: &Message, addr: &str) -> Result<Message, DnsError> {
        exchange(msg, addr).await
    }
}

/// Iterative-per-level, recursive-across-levels resolver sharing one
/// [`AnswerCache`].
pub struct Resolver {
    cache: Arc<AnswerCache>,
    exchanger: Arc<dyn Exchanger>,
}

impl Resolver {
    pub fn new(cache: Arc<AnswerCache>) -> Self {
        Self {
            cache,
            exchanger: Arc::new(UdpExchanger),
        }
    }

    pub fn with_exchanger(cache: Arc<AnswerCache>, exchanger: Arc<dyn Exchanger>) -> Self {
        Self { cache, exchanger }
    }

    /// Resolve `q` starting from the root hints.
    pub async fn resolve_from_root(&self, q: &Query) -> Result<Message, ResolveError> {
        self.resolve(q, ROOTS.map(IpAddr::V4).to_vec(), 0).await
    }

    fn resolve<'a>(
        &'a self,
        q: &'a Query,
        next: Vec<IpAddr>,
        depth: usize,
    ) -> BoxFuture<'a, Result<Message, ResolveError>> {
        Box::pin(async move {
            if let Some(records) = self.cache.lookup(q.name(), q.query_type()) {
                debug!(name = %q.name(), rtype = %q.query_type(), "cache hit");
                return Ok(cached_reply(&records));
            }
            debug!(name = %q.name(), rtype = %q.query_type(), depth, "cache miss");

            if depth > MAX_DEPTH {
                return Err(ResolveError::QueryLoop {
                    name: q.name().to_utf8(),
                });
            }

            let mut last_err = None;
            let mut last_reply = None;
            let mut referral = None;
            for ip in &next {
                // No IPv6 transport.
                let ip = match ip {
                    IpAddr::V4(v4) => *v4,
                    IpAddr::V6(_) => continue,
                };
                let addr = format!("{ip}:53");
                debug!(server = %addr, name = %q.name(), rtype = %q.query_type(), "asking");
                let rmsg = match self.exchanger.exchange(&question_message(q), &addr).await {
                    Ok(rmsg) => rmsg,
                    Err(e) => {
                        debug!(server = %addr, error = %e, "exchange failed, trying next server");
                        last_err = Some(e);
                        continue;
                    }
                };

                if rmsg.authoritative() || rmsg.response_code() == ResponseCode::NXDomain {
                    if rmsg.authoritative() && !rmsg.answers().is_empty() {
                        self.cache
                            .insert(q.name(), q.query_type(), rmsg.answers().to_vec());
                        debug!(name = %q.name(), rtype = %q.query_type(), "cached authoritative answer");
                    }
                    return Ok(rmsg);
                }
                if rmsg.response_code() == ResponseCode::NoError {
                    referral = Some(rmsg);
                    break;
                }
                // Any other rcode: this server was useless, ask the next.
                last_reply = Some(rmsg);
            }

            let Some(rmsg) = referral else {
                let name = q.name().to_utf8();
                // A reply we actually received beats a stale transport
                // error from an earlier candidate.
                return Err(if let Some(reply) = last_reply {
                    ResolveError::ExhaustedNameservers {
                        name,
                        last: Some(Box::new(reply)),
                    }
                } else if let Some(source) = last_err {
                    ResolveError::Exchange { name, source }
                } else {
                    ResolveError::ExhaustedNameservers { name, last: None }
                });
            };

            self.harvest_referral(&rmsg);

            // Chase the delegation: learn each nameserver's address from
            // the root (usually straight out of the glue just cached), then
            // put the same question to it one level down. First subtree
            // that resolves wins.
            for authority in rmsg.name_servers() {
                let ns = match authority.data() {
                    RData::NS(ns) => ns.0.clone(),
                    _ => {
                        return Err(ResolveError::UnexpectedAuthorityType {
                            name: authority.name().to_utf8(),
                            rtype: authority.record_type(),
                        });
                    }
                };
                let mut ns_query = Query::new();
                ns_query.set_name(ns);
                ns_query.set_query_type(RecordType::A);
                ns_query.set_query_class(q.query_class());

                let ns_reply = match self
                    .resolve(&ns_query, ROOTS.map(IpAddr::V4).to_vec(), depth + 1)
                    .await
                {
                    Ok(reply) => reply,
                    Err(e) => {
                        debug!(ns = %ns_query.name(), error = %e, "failed to learn nameserver address");
                        continue;
                    }
                };
                // Answers take precedence over additionals as the source
                // of next-hop addresses.
                let next = if !ns_reply.answers().is_empty() {
                    next_server_addrs(ns_reply.answers())
                } else {
                    next_server_addrs(ns_reply.additionals())
                };
                return self.resolve(q, next, depth + 1).await;
            }

            Err(ResolveError::ExhaustedNameservers {
                name: q.name().to_utf8(),
                last: Some(Box::new(rmsg)),
            })
        })
    }

    /// Populate the cache with the NS records and glue a referral carries.
    /// Keys already present are left alone.
    fn harvest_referral(&self, rmsg: &Message) {
        if let Some(first) = rmsg.name_servers().first() {
            if self.cache.lookup(first.name(), first.record_type()).is_none() {
                self.cache.insert(
                    first.name(),
                    first.record_type(),
                    rmsg.name_servers().to_vec(),
                );
                debug!(name = %first.name(), "cached referral authorities");
            }
        }
        for additional in rmsg.additionals() {
            if self
                .cache
                .lookup(additional.name(), additional.record_type())
                .is_none()
            {
                let matches: Vec<Record> = rmsg
                    .additionals()
                    .iter()
                    .filter(|r| {
                        r.name() == additional.name()
                            && r.record_type() == additional.record_type()
                    })
                    .cloned()
                    .collect();
                self.cache
                    .insert(additional.name(), additional.record_type(), matches);
                debug!(name = %additional.name(), rtype = %additional.record_type(), "cached glue");
            }
        }
    }
}

/// Synthesized reply for a cache hit.
fn cached_reply(records: &Arc<Vec<Record>>) -> Message {
    let mut rmsg = Message::new();
    rmsg.set_id(0);
    rmsg.set_message_type(MessageType::Response);
    rmsg.set_op_code(OpCode::Query);
    rmsg.set_response_code(ResponseCode::NoError);
    rmsg.insert_answers(records.as_ref().clone());
    rmsg
}

/// A fresh query message for `q` with a randomly sampled ID. Iterative
/// queries do not ask the upstream for recursion.
fn question_message(q: &Query) -> Message {
    let mut msg = Message::new();
    msg.set_id(fastrand::u16(..u16::MAX));
    msg.set_message_type(MessageType::Query);
    msg.set_op_code(OpCode::Query);
    msg.add_query(q.clone());
    msg
}

/// Addresses carried by A and AAAA records, in record order.
fn next_server_addrs(records: &[Record]) -> Vec<IpAddr> {
    records
        .iter()
        .filter_map(|r| match r.data() {
            RData::A(a) => Some(IpAddr::V4(a.0)),
            RData::AAAA(aaaa) => Some(IpAddr::V6(aaaa.0)),
            _ => None,
        })
        .collect()
}

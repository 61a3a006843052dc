//! End-to-end tests: a recursor served over a real UDP socket, with the
//! upstream delegation tree scripted behind the resolver's exchange seam.

use async_trait::async_trait;
use burrow_dns_core::{exchange, serve_packet, DnsError, Handler};
use burrow_dns_recursor::{AnswerCache, Exchanger, RecursorHandler, Resolver};
use hickory_proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
use hickory_proto::rr::rdata::{A, NS};
use hickory_proto::rr::{DNSClass, Name, RData, Record, RecordType};
use std::net::{Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::UdpSocket;

/// Scripted delegation tree: the roots refer `example.com.` to
/// `ns1.example.com.` (with glue), which answers authoritatively.
struct FakeHierarchy {
    calls: AtomicUsize,
}

#[async_trait]
impl Exchanger for FakeHierarchy {
    async fn exchange(&self, msg: &Message, addr: &str) -> Result<Message, DnsError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let mut rmsg = Message::new();
        rmsg.set_id(msg.id());
        rmsg.set_message_type(MessageType::Response);
        rmsg.set_op_code(OpCode::Query);
        for q in msg.queries() {
            rmsg.add_query(q.clone());
        }
        let q = &msg.queries()[0];

        if addr == "192.0.2.53:53" {
            // The authoritative server for example.com.
            if q.name().to_utf8().ends_with("example.com.") {
                rmsg.set_authoritative(true);
                rmsg.set_response_code(ResponseCode::NoError);
                rmsg.add_answer(Record::from_rdata(
                    q.name().clone(),
                    3600,
                    RData::A(A(Ipv4Addr::new(93, 184, 216, 34))),
                ));
            } else {
                rmsg.set_authoritative(true);
                rmsg.set_response_code(ResponseCode::NXDomain);
            }
            return Ok(rmsg);
        }

        // Every root refers towards example.com.
        rmsg.set_response_code(ResponseCode::NoError);
        rmsg.add_name_server(Record::from_rdata(
            Name::from_str("example.com.").unwrap(),
            86400,
            RData::NS(NS(Name::from_str("ns1.example.com.").unwrap())),
        ));
        rmsg.add_additional(Record::from_rdata(
            Name::from_str("ns1.example.com.").unwrap(),
            86400,
            RData::A(A(Ipv4Addr::new(192, 0, 2, 53))),
        ));
        Ok(rmsg)
    }
}

/// Serve a recursor on an ephemeral loopback port; returns its address and
/// the upstream call counter.
async fn spawn_recursor() -> (SocketAddr, Arc<FakeHierarchy>) {
    let hierarchy = Arc::new(FakeHierarchy {
        calls: AtomicUsize::new(0),
    });
    let cache = Arc::new(AnswerCache::new());
    let resolver = Arc::new(Resolver::with_exchanger(cache, hierarchy.clone()));
    let handler: Arc<dyn Handler> = Arc::new(RecursorHandler::new(resolver));

    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    tokio::spawn(serve_packet(socket, handler));
    (addr, hierarchy)
}

fn build_typed_query(name: &str, rtype: RecordType, rd: bool) -> Message {
    let mut q = Query::new();
    q.set_name(Name::from_str(name).unwrap());
    q.set_query_type(rtype);
    q.set_query_class(DNSClass::IN);
    let mut msg = Message::new();
    msg.set_id(fastrand::u16(..u16::MAX));
    msg.set_message_type(MessageType::Query);
    msg.set_op_code(OpCode::Query);
    msg.set_recursion_desired(rd);
    msg.add_query(q);
    msg
}

fn build_query(name: &str, rd: bool) -> Message {
    build_typed_query(name, RecordType::A, rd)
}

#[tokio::test]
async fn resolves_a_record_end_to_end() {
    let (addr, _) = spawn_recursor().await;
    let qmsg = build_query("www.example.com.", true);

    let rmsg = exchange(&qmsg, &addr.to_string()).await.unwrap();

    assert_eq!(rmsg.id(), qmsg.id());
    assert_eq!(rmsg.message_type(), MessageType::Response);
    assert!(rmsg.recursion_available());
    assert_eq!(rmsg.response_code(), ResponseCode::NoError);
    assert_eq!(rmsg.queries(), qmsg.queries());
    assert!(!rmsg.answers().is_empty());
    assert_eq!(rmsg.answers()[0].record_type(), RecordType::A);
}

#[tokio::test]
async fn nxdomain_is_passed_through() {
    let (addr, _) = spawn_recursor().await;
    let qmsg = build_query("nxdomain.not-example.test.", true);

    let rmsg = exchange(&qmsg, &addr.to_string()).await.unwrap();

    assert_eq!(rmsg.response_code(), ResponseCode::NXDomain);
    assert!(rmsg.answers().is_empty());
}

#[tokio::test]
async fn second_identical_query_is_served_from_cache() {
    let (addr, hierarchy) = spawn_recursor().await;
    let first_query = build_query("www.example.com.", true);
    let second_query = build_query("www.example.com.", true);

    let first = exchange(&first_query, &addr.to_string()).await.unwrap();
    let upstream_calls = hierarchy.calls.load(Ordering::SeqCst);
    let second = exchange(&second_query, &addr.to_string()).await.unwrap();

    // The repeat produced no new upstream traffic and the same answers.
    assert_eq!(hierarchy.calls.load(Ordering::SeqCst), upstream_calls);
    assert_eq!(second.answers(), first.answers());
}

#[tokio::test]
async fn recursion_not_desired_is_refused() {
    let (addr, hierarchy) = spawn_recursor().await;
    let qmsg = build_query("www.example.com.", false);

    let rmsg = exchange(&qmsg, &addr.to_string()).await.unwrap();

    assert_eq!(rmsg.response_code(), ResponseCode::Refused);
    assert!(rmsg.answers().is_empty());
    assert_eq!(hierarchy.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn any_queries_are_not_implemented() {
    let (addr, _) = spawn_recursor().await;
    let qmsg = build_typed_query("www.example.com.", RecordType::ANY, true);

    let rmsg = exchange(&qmsg, &addr.to_string()).await.unwrap();

    assert_eq!(rmsg.response_code(), ResponseCode::NotImp);
}

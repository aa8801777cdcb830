//! Outstanding queries.
//!
//! Every query sent by the resolver is represented by a [`Query`] kept in
//! the resolver’s dispatch table until it has been answered, has failed,
//! or has become obsolete. The caller holds on to a [`QueryHandle`] which
//! receives the answers exactly once.

use crate::base::iana::{Class, Rtype};
use crate::base::name::to_rooted;
use crate::base::record::{Answers, Record, Status};
use crate::utils::htable::HashEntry;
use core::future::Future;
use core::pin::Pin;
use core::task::{Context, Poll};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::oneshot;

/// The multiplier turning a query ID into its hash value.
const ID_PRIME: u64 = 3571;

/// Returns the dispatch table hash for a query ID.
pub(crate) fn id_hash(id: u16) -> u64 {
    u64::from(id) * ID_PRIME
}

//------------ Reply ---------------------------------------------------------

/// Where the answers of a query go.
#[derive(Debug)]
pub(crate) enum Reply {
    /// Straight to the caller.
    Direct(oneshot::Sender<Answers>),

    /// To a member of a search group.
    Search {
        /// The key of the group.
        group: u32,

        /// The index of the member, zero for the name as given.
        member: usize,
    },
}

//------------ Query ---------------------------------------------------------

/// A query waiting for a response.
#[derive(Debug)]
pub(crate) struct Query {
    /// The message ID of the query.
    pub id: u16,

    /// The absolute domain name asked for.
    pub name: String,

    /// The record type asked for.
    pub rtype: Rtype,

    /// The class asked for.
    pub class: Class,

    /// The index of the server the query was last sent to.
    pub server: usize,

    /// The number of retransmissions caused by timeouts.
    pub retry_count: u8,

    /// Whether the last message sent carried an OPT record.
    pub edns: bool,

    /// Never send an OPT record again.
    pub no_edns: bool,

    /// Whether this query follows a CNAME.
    pub chasing: bool,

    /// When the query was last sent.
    pub timestamp: Instant,

    /// Where the answers go.
    pub reply: Reply,
}

impl Query {
    /// Creates a new query.
    pub fn new(
        id: u16,
        name: String,
        rtype: Rtype,
        server: usize,
        now: Instant,
        reply: Reply,
    ) -> Self {
        Query {
            id,
            name,
            rtype,
            class: Class::IN,
            server,
            retry_count: 0,
            edns: false,
            no_edns: false,
            chasing: false,
            timestamp: now,
            reply,
        }
    }

    /// Returns the error record for this query.
    pub fn error(&self, status: Status) -> Answers {
        vec![Arc::new(Record::error(
            self.name.clone(),
            self.rtype,
            self.class,
            status,
        ))]
    }
}

impl HashEntry for Query {
    fn hash(&self) -> u64 {
        id_hash(self.id)
    }
}

//------------ QueryHandle ---------------------------------------------------

/// The caller’s side of a query.
///
/// The handle is a future resolving into the answers of the query. The
/// answers are either a non-empty list of records or a single error
/// record.
///
/// Dropping the handle unbinds it from the query. The query itself keeps
/// running and its answers still end up in the cache.
#[derive(Debug)]
pub struct QueryHandle {
    rx: oneshot::Receiver<Answers>,
    name: String,
    rtype: Rtype,

    /// Whether the answers have been taken via `try_answers`.
    taken: bool,
}

impl QueryHandle {
    /// Creates a new handle and the sender for its answers.
    pub(crate) fn new(
        name: &str,
        rtype: Rtype,
    ) -> (Self, oneshot::Sender<Answers>) {
        let (tx, rx) = oneshot::channel();
        let res = QueryHandle {
            rx,
            name: to_rooted(name).into_owned(),
            rtype,
            taken: false,
        };
        (res, tx)
    }

    /// Creates a handle that already has its answers.
    pub(crate) fn ready(name: &str, rtype: Rtype, answers: Answers) -> Self {
        let (res, tx) = Self::new(name, rtype);
        // The receiver is still alive, so this cannot fail.
        let _ = tx.send(answers);
        res
    }

    /// Returns the domain name the query was made for.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the record type the query was made for.
    pub fn rtype(&self) -> Rtype {
        self.rtype
    }

    /// Returns the answers if they have arrived.
    ///
    /// The answers are handed out only once. Later calls return `None`.
    pub fn try_answers(&mut self) -> Option<Answers> {
        if self.taken {
            return None;
        }
        let res = match self.rx.try_recv() {
            Ok(answers) => answers,
            Err(oneshot::error::TryRecvError::Empty) => return None,
            Err(oneshot::error::TryRecvError::Closed) => self.lost(),
        };
        self.taken = true;
        Some(res)
    }

    /// The answers for a query dropped by the resolver.
    fn lost(&self) -> Answers {
        vec![Arc::new(Record::error(
            self.name.clone(),
            self.rtype,
            Class::IN,
            Status::InternalErr,
        ))]
    }
}

impl Future for QueryHandle {
    type Output = Answers;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context) -> Poll<Answers> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(answers)) => Poll::Ready(answers),
            Poll::Ready(Err(_)) => Poll::Ready(self.lost()),
            Poll::Pending => Poll::Pending,
        }
    }
}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn handle_delivers_once() {
        let (mut handle, tx) = QueryHandle::new("example.com", Rtype::A);
        assert_eq!(handle.name(), "example.com.");
        assert!(handle.try_answers().is_none());
        let query = Query::new(
            1,
            "example.com.".into(),
            Rtype::A,
            0,
            Instant::now(),
            Reply::Direct(tx),
        );
        let error = query.error(Status::TimeoutErr);
        if let Reply::Direct(tx) = query.reply {
            tx.send(error).unwrap();
        }
        let answers = handle.try_answers().unwrap();
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].status(), Status::TimeoutErr);
        assert!(handle.try_answers().is_none());
    }

    #[test]
    fn dropped_sender() {
        tokio_test::block_on(async {
            let (handle, tx) = QueryHandle::new("example.com.", Rtype::SRV);
            drop(tx);
            let answers = handle.await;
            assert_eq!(answers[0].status(), Status::InternalErr);
            assert_eq!(answers[0].rtype(), Rtype::SRV);
        });
    }

    #[test]
    fn ready_handle() {
        let answers = query_error();
        let handle = QueryHandle::ready("example.com", Rtype::A, answers);
        let answers = tokio_test::block_on(handle);
        assert_eq!(answers[0].status(), Status::NameErr);
    }

    fn query_error() -> Answers {
        let (_, tx) = QueryHandle::new("example.com", Rtype::A);
        Query::new(
            2,
            "example.com.".into(),
            Rtype::A,
            0,
            Instant::now(),
            Reply::Direct(tx),
        )
        .error(Status::NameErr)
    }
}

//! Common test infrastructure shared across integration tests.
//!
//! `RoomHarness` wires in-memory channels into a single `RoomAuthority` and pumps
//! client frames through it, playing the role the hosting runtime plays in
//! production. `HarnessConnector` exposes the harness as a `Connector` so a
//! `ConnectionManager` reconnects against the same room, receiving a fresh
//! connection id each time, exactly as a real socket layer would hand one out.

#![allow(dead_code)] // Shared across test binaries; not every binary uses every helper.

use std::cell::RefCell;
use std::rc::Rc;

use gridroom::net::codec;
use gridroom::{
    BacktrackingGenerator, Board, ClientTransport, ConnectionId, Connector, Difficulty,
    GeneratedPuzzle, GridroomError, MemoryEndpoint, MemoryStore, MemoryTransport, PuzzleSource,
    RoomAuthority, ServerMessage, TransportEvent,
};

/// Installs a test-writer tracing subscriber; safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// A fully solved, valid Sudoku grid used to drive completion scenarios.
pub const SOLVED_GRID: [[u8; 9]; 9] = [
    [5, 3, 4, 6, 7, 8, 9, 1, 2],
    [6, 7, 2, 1, 9, 5, 3, 4, 8],
    [1, 9, 8, 3, 4, 2, 5, 6, 7],
    [8, 5, 9, 7, 6, 1, 4, 2, 3],
    [4, 2, 6, 8, 5, 3, 7, 9, 1],
    [7, 1, 3, 9, 2, 4, 8, 5, 6],
    [9, 6, 1, 5, 3, 7, 2, 8, 4],
    [2, 8, 7, 4, 1, 9, 6, 3, 5],
    [3, 4, 5, 2, 8, 6, 9, 7, 1],
];

/// The solved grid with a single hole at (0, 0); filling it with 5 completes the board.
pub fn almost_solved() -> Board {
    let mut cells = SOLVED_GRID;
    cells[0][0] = 0;
    Board::new(cells)
}

/// Puzzle source returning one canned board, so tests control completion exactly.
pub struct CannedSource {
    pub puzzle: Board,
}

impl PuzzleSource for CannedSource {
    fn generate(&mut self, _difficulty: Difficulty) -> Result<GeneratedPuzzle, GridroomError> {
        Ok(GeneratedPuzzle {
            puzzle: self.puzzle,
            solution: Board::new(SOLVED_GRID),
            rating: 1.0,
            category: Difficulty::Easy,
        })
    }
}

/// One room authority plus the server halves of every channel ever connected to it.
pub struct RoomHarness {
    pub authority: RoomAuthority<MemoryStore, CannedSource>,
    endpoints: Vec<MemoryEndpoint>,
    next_id: u32,
}

impl RoomHarness {
    /// A room whose generator yields a deterministic real puzzle.
    pub fn new() -> Self {
        let generated = BacktrackingGenerator::seeded(7)
            .generate(Difficulty::Easy)
            .expect("seeded generation cannot fail");
        Self::with_puzzle(generated.puzzle)
    }

    /// A room whose generator always yields the given board.
    pub fn with_puzzle(puzzle: Board) -> Self {
        Self {
            authority: RoomAuthority::new(MemoryStore::new(), CannedSource { puzzle }),
            endpoints: Vec::new(),
            next_id: 0,
        }
    }

    /// Opens a new channel into the room, as a socket runtime would on an incoming
    /// connection, and returns the client half with its assigned id.
    pub fn open_channel(&mut self) -> (ConnectionId, MemoryTransport) {
        self.next_id += 1;
        let id = ConnectionId::new(format!("conn-{}", self.next_id));
        let (transport, endpoint) = MemoryTransport::pair(id.clone());
        self.authority
            .on_connect(id.clone(), Box::new(endpoint.clone()))
            .expect("on_connect against MemoryStore cannot fail");
        self.endpoints.push(endpoint);
        (id, transport)
    }

    /// Injects a server-side fault on the given channel; its client observes an
    /// error followed by a close on the next poll.
    pub fn fail_channel(&mut self, id: &ConnectionId) {
        for endpoint in &self.endpoints {
            if endpoint.id() == id {
                endpoint.fail("injected channel fault");
            }
        }
    }

    /// Feeds every client frame queued so far into the authority and retires closed
    /// channels, repeating until no progress is made.
    pub fn pump(&mut self) {
        loop {
            let mut progressed = false;
            for i in 0..self.endpoints.len() {
                let id = self.endpoints[i].id().clone();
                for text in self.endpoints[i].take_outgoing() {
                    self.authority
                        .on_message(&id, &text)
                        .expect("infrastructure failure in test room");
                    progressed = true;
                }
            }
            let authority = &mut self.authority;
            self.endpoints.retain(|endpoint| {
                if endpoint.is_open() {
                    true
                } else {
                    authority.on_disconnect(endpoint.id());
                    false
                }
            });
            if !progressed {
                break;
            }
        }
    }
}

/// Connector handing out fresh channels into a shared [`RoomHarness`].
pub struct HarnessConnector {
    harness: Rc<RefCell<RoomHarness>>,
}

impl HarnessConnector {
    pub fn new(harness: Rc<RefCell<RoomHarness>>) -> Self {
        Self { harness }
    }
}

impl Connector for HarnessConnector {
    type Transport = MemoryTransport;

    fn connect(&mut self) -> Result<MemoryTransport, GridroomError> {
        Ok(self.harness.borrow_mut().open_channel().1)
    }
}

/// Drains a client transport and decodes the server messages it received, ignoring
/// lifecycle events.
pub fn received_messages(transport: &mut MemoryTransport) -> Vec<ServerMessage> {
    transport
        .poll()
        .into_iter()
        .filter_map(|event| match event {
            TransportEvent::Message { text } => {
                Some(codec::decode(&text).expect("server sent malformed frame"))
            }
            _ => None,
        })
        .collect()
}

/// Encodes and sends a client message over a transport.
pub fn send(
    transport: &mut MemoryTransport,
    message: &gridroom::ClientMessage,
) -> Result<(), GridroomError> {
    transport.send(&codec::encode(message)?)
}

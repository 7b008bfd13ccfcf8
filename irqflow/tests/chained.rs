// SPDX-License-Identifier: MPL-2.0

//! A cascaded controller whose lines are demultiplexed from one parent line.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicU32, Ordering},
};

use irqflow::{
    ActionFlags, FlowHandler, IrqAction, IrqChip, IrqConfig, IrqDesc, IrqFlow, IrqNum, IrqReturn,
    IrqStatus, IrqTable,
};

const PARENT: IrqNum = 5;
const CHILD_BASE: IrqNum = 32;
const NR_CHILDREN: u32 = 8;

/// The parent side of the cascade: one line on the root controller.
#[derive(Default)]
struct RootChip {
    log: Mutex<Vec<&'static str>>,
}

impl IrqChip for RootChip {
    fn typename(&self) -> &'static str {
        "root"
    }

    fn mask(&self, _irq: IrqNum) {
        self.log.lock().unwrap().push("root mask");
    }

    fn unmask(&self, _irq: IrqNum) {
        self.log.lock().unwrap().push("root unmask");
    }

    fn ack(&self, _irq: IrqNum) {
        self.log.lock().unwrap().push("root ack");
    }
}

/// The cascaded controller with a pending register and a mask register.
#[derive(Default)]
struct CascadeChip {
    pending: AtomicU32,
    masked: AtomicU32,
}

impl CascadeChip {
    fn bit(irq: IrqNum) -> u32 {
        1 << (irq - CHILD_BASE)
    }

    fn raise(&self, child: u32) {
        self.pending.fetch_or(1 << child, Ordering::SeqCst);
    }
}

impl IrqChip for CascadeChip {
    fn typename(&self) -> &'static str {
        "cascade"
    }

    fn mask(&self, irq: IrqNum) {
        self.masked.fetch_or(Self::bit(irq), Ordering::SeqCst);
    }

    fn unmask(&self, irq: IrqNum) {
        self.masked.fetch_and(!Self::bit(irq), Ordering::SeqCst);
    }

    fn ack(&self, irq: IrqNum) {
        self.pending.fetch_and(!Self::bit(irq), Ordering::SeqCst);
    }
}

/// Dispatches every pending, unmasked line of the cascade.
struct CascadeFlow {
    cascade: Arc<CascadeChip>,
}

impl IrqFlow for CascadeFlow {
    fn name(&self) -> &'static str {
        "cascade"
    }

    fn handle(&self, table: &IrqTable, desc: &IrqDesc) {
        desc.mask_ack();
        let pending = self.cascade.pending.load(Ordering::SeqCst)
            & !self.cascade.masked.load(Ordering::SeqCst);
        for child in (0..NR_CHILDREN).filter(|child| pending & (1 << child) != 0) {
            table.handle_irq(CHILD_BASE + child);
        }
        desc.unmask();
    }
}

fn setup() -> (IrqTable, Arc<RootChip>, Arc<CascadeChip>) {
    let table = IrqTable::new(IrqConfig {
        nr_irqs: 64,
        ..IrqConfig::default()
    });
    let root = Arc::new(RootChip::default());
    let cascade = Arc::new(CascadeChip::default());

    table.set_chip(PARENT, Some(root.clone())).unwrap();
    table
        .set_handler(
            PARENT,
            Some(FlowHandler::custom(CascadeFlow {
                cascade: cascade.clone(),
            })),
            true,
            Some("cascade-demux"),
        )
        .unwrap();
    for child in 0..NR_CHILDREN {
        table
            .set_chip_and_handler_name(
                CHILD_BASE + child,
                Some(cascade.clone()),
                FlowHandler::Level,
                "cascade-level",
            )
            .unwrap();
    }
    root.log.lock().unwrap().clear();
    (table, root, cascade)
}

#[test]
fn children_are_demultiplexed() {
    let (table, root, cascade) = setup();
    let hits = Arc::new(Mutex::new(Vec::new()));
    for child in [1, 6] {
        let hits = hits.clone();
        let _handle = table
            .request_irq(
                CHILD_BASE + child,
                IrqAction::new("child", ActionFlags::empty(), move |irq| {
                    hits.lock().unwrap().push(irq);
                    IrqReturn::Handled
                }),
            )
            .unwrap();
    }

    cascade.raise(6);
    cascade.raise(1);
    table.handle_irq(PARENT);

    assert_eq!(*hits.lock().unwrap(), [CHILD_BASE + 1, CHILD_BASE + 6]);
    assert_eq!(
        *root.log.lock().unwrap(),
        ["root mask", "root ack", "root unmask"]
    );
    assert_eq!(cascade.pending.load(Ordering::SeqCst), 0);
    assert_eq!(cascade.masked.load(Ordering::SeqCst), 0);
    assert_eq!(table.desc(CHILD_BASE + 1).unwrap().kstat_irqs(), 1);
    assert_eq!(table.desc(PARENT).unwrap().kstat_irqs(), 0);
}

#[test]
fn parent_line_cannot_be_requested() {
    let (table, _root, _cascade) = setup();
    let status = table.desc(PARENT).unwrap().status();
    assert!(status.contains(IrqStatus::NOREQUEST | IrqStatus::NOPROBE));
    assert!(!status.contains(IrqStatus::DISABLED));
    assert_eq!(table.handler_name(PARENT), Some("cascade-demux"));
    assert_eq!(
        table
            .request_irq(
                PARENT,
                IrqAction::new("intruder", ActionFlags::SHARED, |_| IrqReturn::Handled),
            )
            .err(),
        Some(irqflow::Error::InvalidArgs)
    );
}

#[test]
fn child_without_action_stays_masked() {
    let (table, _root, cascade) = setup();
    cascade.raise(3);
    table.handle_irq(PARENT);

    let desc = table.desc(CHILD_BASE + 3).unwrap();
    assert!(desc.status().contains(IrqStatus::PENDING | IrqStatus::MASKED));
    assert_eq!(cascade.masked.load(Ordering::SeqCst), 1 << 3);
    assert_eq!(table.handler_name(CHILD_BASE + 3), Some("cascade-level"));
    assert_eq!(table.chip_name(CHILD_BASE + 3).as_deref(), Some("cascade"));
}

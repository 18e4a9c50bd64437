use crate::types::NodeId;

#[derive(Debug, Clone)]
pub struct RemoteNode {
    id: NodeId,
    last_seen_ms: u64,
    reset_count: u32,
}

impl RemoteNode {
    pub fn new(id: NodeId, now_ms: u64) -> Self {
        Self {
            id,
            last_seen_ms: now_ms,
            reset_count: 0,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn last_seen_ms(&self) -> u64 {
        self.last_seen_ms
    }

    pub fn reset_count(&self) -> u32 {
        self.reset_count
    }

    pub fn silent_for_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.last_seen_ms)
    }
}

/// Tracks when each remote room node was last heard from.
///
/// A node that stays silent for the timeout gets its reset counter bumped
/// and its last-seen moved to now, so it has a full interval to come back
/// before it can trigger again. The caller power-cycles the shared supply.
#[derive(Debug, Clone)]
pub struct RemoteNodeWatchdog {
    timeout_ms: u64,
    nodes: [RemoteNode; 4],
}

impl RemoteNodeWatchdog {
    pub fn new(timeout_ms: u64, now_ms: u64) -> Self {
        Self {
            timeout_ms,
            nodes: NodeId::ALL.map(|id| RemoteNode::new(id, now_ms)),
        }
    }

    pub fn nodes(&self) -> &[RemoteNode] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> &RemoteNode {
        &self.nodes[id.index()]
    }

    pub fn record_seen(&mut self, id: NodeId, now_ms: u64) {
        self.nodes[id.index()].last_seen_ms = now_ms;
    }

    /// Returns the nodes that timed out on this check.
    pub fn check(&mut self, now_ms: u64) -> Vec<NodeId> {
        let timeout_ms = self.timeout_ms;
        self.nodes
            .iter_mut()
            .filter(|node| node.silent_for_ms(now_ms) >= timeout_ms)
            .map(|node| {
                node.reset_count += 1;
                node.last_seen_ms = now_ms;
                node.id
            })
            .collect()
    }

    /// One-line counter report, e.g. `RST: BandB=0 BADK=2 INKOM=0 WASPL=1`.
    pub fn reset_report(&self) -> String {
        let counters = self
            .nodes
            .iter()
            .map(|node| format!("{}={}", node.id.as_str(), node.reset_count))
            .collect::<Vec<_>>()
            .join(" ");
        format!("RST: {counters}")
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const TIMEOUT: u64 = 600_000;

    #[test]
    fn silent_node_triggers_once_per_interval() {
        let mut watchdog = RemoteNodeWatchdog::new(TIMEOUT, 0);
        for node in NodeId::ALL {
            if node != NodeId::Badk {
                watchdog.record_seen(node, 500_000);
            }
        }

        assert_eq!(watchdog.check(TIMEOUT - 1), vec![]);
        assert_eq!(watchdog.check(TIMEOUT), vec![NodeId::Badk]);
        assert_eq!(watchdog.node(NodeId::Badk).reset_count(), 1);

        // Still silent, but last-seen was moved forward.
        assert_eq!(watchdog.check(TIMEOUT + 1_000), vec![]);
        assert_eq!(watchdog.check(TIMEOUT + 60_000), vec![]);
        assert_eq!(watchdog.node(NodeId::Badk).reset_count(), 1);
        assert_eq!(watchdog.node(NodeId::Badk).last_seen_ms(), TIMEOUT);
    }

    #[test]
    fn nodes_are_checked_independently() {
        let mut watchdog = RemoteNodeWatchdog::new(TIMEOUT, 0);
        watchdog.record_seen(NodeId::BandB, 100_000);
        watchdog.record_seen(NodeId::Waspl, 100_000);

        assert_eq!(watchdog.check(TIMEOUT), vec![NodeId::Badk, NodeId::Inkom]);
        assert_eq!(
            watchdog.check(TIMEOUT + 100_000),
            vec![NodeId::BandB, NodeId::Waspl]
        );
        assert_eq!(
            watchdog.reset_report(),
            "RST: BandB=1 BADK=1 INKOM=1 WASPL=1"
        );
    }

    #[test]
    fn any_message_refreshes_last_seen() {
        let mut watchdog = RemoteNodeWatchdog::new(TIMEOUT, 0);
        for step in 1..=10 {
            let now = step * 300_000;
            for node in NodeId::ALL {
                watchdog.record_seen(node, now);
            }
            assert_eq!(watchdog.check(now + 1), vec![]);
        }
    }
}

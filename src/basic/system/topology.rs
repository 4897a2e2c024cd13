use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::Bfs;

use crate::basic::network::{BusId, Network};

/// Buses with no line path to `slack`, in ascending id order.
pub(crate) fn unreachable_buses(network: &Network, slack: BusId) -> Vec<BusId> {
    let n = network.buses().len();
    let mut graph = UnGraph::<(), ()>::with_capacity(n, network.lines().len());
    let nodes: Vec<NodeIndex> = (0..n).map(|_| graph.add_node(())).collect();
    for line in network.lines() {
        graph.add_edge(nodes[line.from_bus.index()], nodes[line.to_bus.index()], ());
    }

    let mut reached = vec![false; n];
    let mut bfs = Bfs::new(&graph, nodes[slack.index()]);
    while let Some(nx) = bfs.next(&graph) {
        reached[nx.index()] = true;
    }
    reached
        .iter()
        .enumerate()
        .filter(|(_, r)| !**r)
        .map(|(i, _)| BusId(i))
        .collect()
}

use bio::alignment::pairwise::Aligner;
use bio::alignment::AlignmentOperation;
use nalgebra::DMatrix;
use petgraph::graph::{NodeIndex, UnGraph};

//----------------------------
// Cluster engine
//----------------------------

#[derive(Debug, Clone)]
pub struct ClusterParams {
    pub min_len: u64,
    pub min_weight: f64,
    pub inflation: f64,
    pub expansion: u32,
    pub max_iter: usize,
}

impl Default for ClusterParams {
    fn default() -> Self {
        Self {
            min_len: 1000,
            min_weight: 0.5,
            inflation: 2.0,
            expansion: 2,
            max_iter: 100,
        }
    }
}

/// One orthologous group of elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster {
    pub id: String,
    pub members: Vec<String>,
}

/// Sequence identity over aligned length for a pair of element
/// sequences, global alignment.
///
/// ```
/// use mgec::libs::cluster::identity;
/// assert!((identity(b"ACGTACGT", b"ACGTACGT") - 1.0).abs() < 1e-9);
/// assert!(identity(b"ACGTACGT", b"ACGAACGT") < 1.0);
/// assert_eq!(identity(b"", b"ACGT"), 0.0);
/// ```
pub fn identity(a: &[u8], b: &[u8]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    // the Match op tag only covers byte-equal pairs, so soft-masked
    // (lowercase) regions must be normalized before aligning
    let a = a.to_ascii_uppercase();
    let b = b.to_ascii_uppercase();

    let score = |x: u8, y: u8| if x == y { 1i32 } else { -1i32 };
    let mut aligner = Aligner::with_capacity(a.len(), b.len(), -5, -1, &score);
    let alignment = aligner.global(&a, &b);

    if alignment.operations.is_empty() {
        return 0.0;
    }
    let matches = alignment
        .operations
        .iter()
        .filter(|op| matches!(op, AlignmentOperation::Match))
        .count();
    matches as f64 / alignment.operations.len() as f64
}

/// Partition element sequences into clusters.
///
/// Pairs where both sequences pass the length floor are scored with
/// [identity]; scores at or above `min_weight` become weighted edges
/// of an undirected graph. Each connected component is then split by
/// Markov clustering; nodes with no qualifying edge come out as
/// singletons. Returned clusters hold member indices into `seqs`.
pub fn cluster_elements(seqs: &[Vec<u8>], params: &ClusterParams) -> Vec<Vec<usize>> {
    let mut graph: UnGraph<usize, f64> = UnGraph::new_undirected();
    let nodes: Vec<NodeIndex> = (0..seqs.len()).map(|i| graph.add_node(i)).collect();

    for i in 0..seqs.len() {
        if (seqs[i].len() as u64) < params.min_len {
            continue;
        }
        for j in (i + 1)..seqs.len() {
            if (seqs[j].len() as u64) < params.min_len {
                continue;
            }
            let weight = identity(&seqs[i], &seqs[j]);
            if weight >= params.min_weight {
                graph.add_edge(nodes[i], nodes[j], weight);
            }
        }
    }

    let mut clusters: Vec<Vec<usize>> = vec![];
    let mut seen = vec![false; seqs.len()];

    for start in 0..seqs.len() {
        if seen[start] {
            continue;
        }

        // collect the connected component by BFS
        let mut component = vec![];
        let mut queue = std::collections::VecDeque::from([start]);
        seen[start] = true;
        while let Some(i) = queue.pop_front() {
            component.push(i);
            for nbr in graph.neighbors(nodes[i]) {
                let j = graph[nbr];
                if !seen[j] {
                    seen[j] = true;
                    queue.push_back(j);
                }
            }
        }
        component.sort_unstable();

        if component.len() == 1 {
            clusters.push(component);
            continue;
        }

        // adjacency submatrix for this component
        let n = component.len();
        let mut adj = DMatrix::<f64>::zeros(n, n);
        for (a, &i) in component.iter().enumerate() {
            for (b, &j) in component.iter().enumerate() {
                if let Some(edge) = graph.find_edge(nodes[i], nodes[j]) {
                    adj[(a, b)] = graph[edge];
                }
            }
        }

        for local in mcl(adj, params.expansion, params.inflation, params.max_iter) {
            clusters.push(local.into_iter().map(|a| component[a]).collect());
        }
    }

    clusters
}

/// Markov clustering on a weighted adjacency matrix: alternate
/// expansion (matrix power) and inflation (elementwise power with
/// column re-normalization) until the flow matrix stabilizes, then
/// read clusters off the attractors.
fn mcl(mut m: DMatrix<f64>, expansion: u32, inflation: f64, max_iter: usize) -> Vec<Vec<usize>> {
    let n = m.nrows();

    // self loops damp oscillation
    for i in 0..n {
        m[(i, i)] = 1.0;
    }
    normalize_columns(&mut m);

    for _ in 0..max_iter {
        let mut expanded = m.clone();
        for _ in 1..expansion.max(1) {
            expanded = &expanded * &m;
        }
        expanded.apply(|x| *x = x.powf(inflation));
        normalize_columns(&mut expanded);

        let delta = (&expanded - &m).abs().max();
        m = expanded;
        if delta < 1e-6 {
            break;
        }
    }

    // each column joins the attractor row carrying most of its flow
    let mut by_attractor: std::collections::BTreeMap<usize, Vec<usize>> = Default::default();
    for j in 0..n {
        let mut best = 0;
        let mut best_flow = f64::MIN;
        for i in 0..n {
            if m[(i, j)] > best_flow {
                best_flow = m[(i, j)];
                best = i;
            }
        }
        by_attractor.entry(best).or_default().push(j);
    }

    by_attractor.into_values().collect()
}

fn normalize_columns(m: &mut DMatrix<f64>) {
    let n = m.nrows();
    for j in 0..m.ncols() {
        let sum: f64 = m.column(j).sum();
        if sum > 0.0 {
            for i in 0..n {
                m[(i, j)] /= sum;
            }
        }
    }
}

/// Stable identifiers: decreasing cluster size, ties broken by the
/// earliest-created member; an optional prefix keeps a secondary pass
/// from colliding with the primary one.
pub fn assign_ids(mut clusters: Vec<Vec<usize>>, names: &[String], prefix: &str) -> Vec<Cluster> {
    for members in clusters.iter_mut() {
        members.sort_unstable();
    }
    clusters.sort_by(|a, b| b.len().cmp(&a.len()).then(a[0].cmp(&b[0])));

    clusters
        .into_iter()
        .enumerate()
        .map(|(i, members)| Cluster {
            id: format!("{}{}", prefix, i + 1),
            members: members.into_iter().map(|m| names[m].clone()).collect(),
        })
        .collect()
}

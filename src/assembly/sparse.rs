//! Block-sparse matrix storage for assembled Jacobians.
use crate::mesh::GalerkinMesh;
use crate::Real;
use eyre::eyre;
use log::debug;
use nalgebra::{DMatrix, DMatrixView};
use nalgebra_sparse::pattern::SparsityPattern;
use nalgebra_sparse::CsrMatrix;
use std::collections::BTreeSet;

/// Destination of assembled element matrices, addressed by node blocks.
///
/// Blocks are accumulated additively.
pub trait BlockMatrixSink<T: Real> {
    /// Adds `block` to the block at `(row_node, col_node)`.
    fn add_block(&mut self, row_node: usize, col_node: usize, block: DMatrixView<T>) -> eyre::Result<()>;

    /// Adds a dense element matrix whose rows and columns are ordered by `nodes`.
    fn add_element_matrix(&mut self, nodes: &[usize], element_matrix: &DMatrix<T>) -> eyre::Result<()> {
        if nodes.is_empty() {
            return Ok(());
        }
        let s = element_matrix.nrows() / nodes.len();
        if s * nodes.len() != element_matrix.nrows() || element_matrix.nrows() != element_matrix.ncols() {
            return Err(eyre!(
                "element matrix of shape {:?} does not match {} nodes",
                element_matrix.shape(),
                nodes.len()
            ));
        }
        for (i, &row_node) in nodes.iter().enumerate() {
            for (j, &col_node) in nodes.iter().enumerate() {
                self.add_block(row_node, col_node, element_matrix.view((s * i, s * j), (s, s)))?;
            }
        }
        Ok(())
    }
}

/// Dense storage, with the block size taken from the blocks themselves.
impl<T: Real> BlockMatrixSink<T> for DMatrix<T> {
    fn add_block(&mut self, row_node: usize, col_node: usize, block: DMatrixView<T>) -> eyre::Result<()> {
        let (r, c) = (block.nrows() * row_node, block.ncols() * col_node);
        if r + block.nrows() > self.nrows() || c + block.ncols() > self.ncols() {
            return Err(eyre!(
                "block ({row_node}, {col_node}) out of bounds for matrix of shape {:?}",
                self.shape()
            ));
        }
        let mut view = self.view_mut((r, c), block.shape());
        view += block;
        Ok(())
    }
}

/// A CSR matrix whose sparsity pattern consists of dense `block_size x block_size` blocks.
///
/// Row and column blocks correspond to mesh nodes, and node `i` owns the scalar rows
/// `block_size * i .. block_size * (i + 1)`.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockCsrMatrix<T> {
    block_size: usize,
    matrix: CsrMatrix<T>,
}

impl<T: Real> BlockCsrMatrix<T> {
    /// A zero matrix with a block for every pair of nodes sharing an element stencil.
    pub fn from_mesh(mesh: &impl GalerkinMesh<T>, block_size: usize) -> Self {
        let pattern = assemble_block_pattern(mesh, block_size);
        let nnz = pattern.nnz();
        let matrix = CsrMatrix::try_from_pattern_and_values(pattern, vec![T::zero(); nnz])
            .expect("Internal error: values match the pattern by construction");
        Self { block_size, matrix }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn num_block_rows(&self) -> usize {
        self.matrix.nrows() / self.block_size.max(1)
    }

    pub fn as_csr(&self) -> &CsrMatrix<T> {
        &self.matrix
    }

    pub fn into_csr(self) -> CsrMatrix<T> {
        self.matrix
    }

    pub fn to_dense(&self) -> DMatrix<T> {
        DMatrix::from(&self.matrix)
    }

    pub fn values(&self) -> &[T] {
        self.matrix.values()
    }

    pub fn fill(&mut self, value: T) {
        self.matrix.values_mut().fill(value);
    }

    /// Adds `values`, laid out like the stored values, to the stored values.
    pub fn add_values(&mut self, values: &[T]) -> eyre::Result<()> {
        let own = self.matrix.values_mut();
        if own.len() != values.len() {
            return Err(eyre!("expected {} values, got {}", own.len(), values.len()));
        }
        for (a, &b) in own.iter_mut().zip(values) {
            *a += b;
        }
        Ok(())
    }

    /// Adds `block` to the block at `(row_node, col_node)` of `values`, a value array laid out
    /// like the stored values of this matrix.
    ///
    /// Used to accumulate into per-thread value arrays that share the pattern of this matrix.
    pub fn add_block_to_values(
        &self,
        values: &mut [T],
        row_node: usize,
        col_node: usize,
        block: DMatrixView<T>,
    ) -> eyre::Result<()> {
        let (row_offsets, col_indices, _) = self.matrix.csr_data();
        if values.len() != col_indices.len() {
            return Err(eyre!("expected {} values, got {}", col_indices.len(), values.len()));
        }
        add_block_to_csr_values(row_offsets, col_indices, values, self.block_size, row_node, col_node, block)
    }
}

impl<T: Real> BlockMatrixSink<T> for BlockCsrMatrix<T> {
    fn add_block(&mut self, row_node: usize, col_node: usize, block: DMatrixView<T>) -> eyre::Result<()> {
        let s = self.block_size;
        let (row_offsets, col_indices, values) = self.matrix.csr_data_mut();
        add_block_to_csr_values(row_offsets, col_indices, values, s, row_node, col_node, block)
    }
}

fn add_block_to_csr_values<T: Real>(
    row_offsets: &[usize],
    col_indices: &[usize],
    values: &mut [T],
    s: usize,
    row_node: usize,
    col_node: usize,
    block: DMatrixView<T>,
) -> eyre::Result<()> {
    if block.shape() != (s, s) {
        return Err(eyre!("expected {s}x{s} block, got {:?}", block.shape()));
    }
    let num_block_rows = (row_offsets.len() - 1) / s;
    if row_node >= num_block_rows || col_node >= num_block_rows {
        return Err(eyre!(
            "block ({row_node}, {col_node}) out of bounds for {num_block_rows} block rows"
        ));
    }
    for a in 0..s {
        let row = s * row_node + a;
        let range = row_offsets[row]..row_offsets[row + 1];
        // Blocks are dense, so the columns of a block row are contiguous
        let start = col_indices[range.clone()]
            .binary_search(&(s * col_node))
            .map(|position| range.start + position)
            .map_err(|_| eyre!("block ({row_node}, {col_node}) is not part of the sparsity pattern"))?;
        for b in 0..s {
            values[start + b] += block[(a, b)];
        }
    }
    Ok(())
}

/// Builds the scalar sparsity pattern of the node blocks coupled by element stencils.
pub fn assemble_block_pattern<T: Real>(mesh: &impl GalerkinMesh<T>, block_size: usize) -> SparsityPattern {
    // Collecting into a BTreeSet stores every node pair once, regardless of how many stencils share it
    let mut node_pairs = BTreeSet::new();
    for element in 0..mesh.num_elements() {
        let nodes = mesh.element_nodes(element);
        for &node_i in nodes {
            for &node_j in nodes {
                node_pairs.insert((node_i, node_j));
            }
        }
    }

    let s = block_size;
    let num_rows = s * mesh.num_nodes();
    let mut block_columns = vec![Vec::new(); mesh.num_nodes()];
    for (node_i, node_j) in node_pairs {
        block_columns[node_i].push(node_j);
    }

    let mut offsets = Vec::with_capacity(num_rows + 1);
    let mut column_indices = Vec::new();
    offsets.push(0);
    for columns in &block_columns {
        for _ in 0..s {
            for &node_j in columns {
                column_indices.extend(s * node_j..s * (node_j + 1));
            }
            offsets.push(column_indices.len());
        }
    }

    debug!("Assembled block sparsity pattern with {} entries", column_indices.len());
    SparsityPattern::try_from_offsets_and_indices(num_rows, num_rows, offsets, column_indices)
        .expect("Internal error: block pattern is sorted and in bounds by construction")
}

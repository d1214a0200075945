// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod poller;
pub mod vfs_tree;

pub use poller::{Poller, RequestSequence, RequestTicket};
pub use vfs_tree::{DirectoryLister, VfsTree};

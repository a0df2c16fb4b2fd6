//! Host and bridge tests driven by scripted servers.

mod support;

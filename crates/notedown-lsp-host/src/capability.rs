//! Capability modelling and resolution.

use std::collections::BTreeMap;
use std::fmt;

use crate::command::NotedownCommand;
use crate::server::ServerCapabilitySet;

/// Feature exposed through the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CapabilityKind {
    /// `notedown.getListItemBoundaries`.
    ListItemBoundaries,
    /// `notedown.getConcealRanges`.
    ConcealRanges,
    /// `notedown.executeCodeBlocks`.
    ExecuteCodeBlocks,
    /// `textDocument/foldingRange`.
    FoldingRange,
    /// `textDocument/definition`.
    Definition,
    /// `textDocument/completion`.
    Completion,
    /// `textDocument/codeAction`.
    CodeAction,
}

impl CapabilityKind {
    const ALL: [Self; 7] = [
        Self::ListItemBoundaries,
        Self::ConcealRanges,
        Self::ExecuteCodeBlocks,
        Self::FoldingRange,
        Self::Definition,
        Self::Completion,
        Self::CodeAction,
    ];

    /// Method or command name the capability gates.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::ListItemBoundaries => NotedownCommand::ListItemBoundaries.wire_name(),
            Self::ConcealRanges => NotedownCommand::ConcealRanges.wire_name(),
            Self::ExecuteCodeBlocks => NotedownCommand::ExecuteCodeBlocks.wire_name(),
            Self::FoldingRange => "textDocument/foldingRange",
            Self::Definition => "textDocument/definition",
            Self::Completion => "textDocument/completion",
            Self::CodeAction => "textDocument/codeAction",
        }
    }
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.key())
    }
}

/// Provenance for a capability's availability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilitySource {
    /// Provided directly by the language server.
    ServerAdvertised,
    /// The server has no `executeCommandProvider`.
    NoCommandProvider,
    /// Unavailable because the server does not list it.
    MissingOnServer,
}

impl fmt::Display for CapabilitySource {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::ServerAdvertised => "advertised by server",
            Self::NoCommandProvider => "server has no executeCommand provider",
            Self::MissingOnServer => "missing from server",
        };
        formatter.write_str(label)
    }
}

/// Effective state for a single capability after negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilityState {
    /// Capability kind being described.
    pub kind: CapabilityKind,
    /// Whether the capability is usable.
    pub enabled: bool,
    /// Why the capability is (un)available.
    pub source: CapabilitySource,
}

impl CapabilityState {
    /// Constructs a new capability state.
    #[must_use]
    pub const fn new(kind: CapabilityKind, enabled: bool, source: CapabilitySource) -> Self {
        Self {
            kind,
            enabled,
            source,
        }
    }
}

/// Capability summary for one session, fixed at attach time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilitySummary {
    states: BTreeMap<CapabilityKind, CapabilityState>,
    commands: Vec<String>,
}

impl CapabilitySummary {
    /// Returns the state for the requested capability.
    #[must_use]
    pub fn state(&self, capability: CapabilityKind) -> CapabilityState {
        match self.states.get(&capability) {
            Some(state) => *state,
            None => CapabilityState::new(capability, false, CapabilitySource::MissingOnServer),
        }
    }

    /// Returns an iterator over all resolved capability states.
    pub fn states(&self) -> impl Iterator<Item = CapabilityState> + '_ {
        self.states.values().copied()
    }

    /// Every command the server advertised, including ones this client
    /// never issues.
    #[must_use]
    pub fn advertised_commands(&self) -> &[String] {
        &self.commands
    }
}

/// Resolves availability from the handshake result.
///
/// A custom command is usable only when the server has an
/// `executeCommandProvider` and that provider lists the command.
pub(crate) fn resolve_capabilities(advertised: &ServerCapabilitySet) -> CapabilitySummary {
    let states = CapabilityKind::ALL
        .into_iter()
        .map(|kind| (kind, resolve_state(kind, advertised)))
        .collect();
    CapabilitySummary {
        states,
        commands: advertised.commands().map(String::from).collect(),
    }
}

fn resolve_state(capability: CapabilityKind, advertised: &ServerCapabilitySet) -> CapabilityState {
    let available = match capability {
        CapabilityKind::ListItemBoundaries
        | CapabilityKind::ConcealRanges
        | CapabilityKind::ExecuteCodeBlocks => {
            if !advertised.has_execute_command_provider() {
                return CapabilityState::new(
                    capability,
                    false,
                    CapabilitySource::NoCommandProvider,
                );
            }
            advertised.advertises_command(capability.key())
        }
        CapabilityKind::FoldingRange => advertised.supports_folding_range(),
        CapabilityKind::Definition => advertised.supports_definition(),
        CapabilityKind::Completion => advertised.supports_completion(),
        CapabilityKind::CodeAction => advertised.supports_code_action(),
    };

    CapabilityState::new(capability, available, capability_source(available))
}

const fn capability_source(available: bool) -> CapabilitySource {
    if available {
        CapabilitySource::ServerAdvertised
    } else {
        CapabilitySource::MissingOnServer
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn listed_commands_are_enabled() {
        let advertised = ServerCapabilitySet::new()
            .with_execute_commands(["notedown.getListItemBoundaries", "notedown.other"]);

        let summary = resolve_capabilities(&advertised);

        assert!(summary.state(CapabilityKind::ListItemBoundaries).enabled);
        assert_eq!(
            summary.state(CapabilityKind::ConcealRanges).source,
            CapabilitySource::MissingOnServer
        );
        assert_eq!(summary.advertised_commands().len(), 2);
    }

    #[rstest]
    fn commands_need_a_provider() {
        let summary = resolve_capabilities(&ServerCapabilitySet::new().with_folding_range(true));

        let state = summary.state(CapabilityKind::ExecuteCodeBlocks);
        assert!(!state.enabled);
        assert_eq!(state.source, CapabilitySource::NoCommandProvider);
        assert!(summary.state(CapabilityKind::FoldingRange).enabled);
        assert!(!summary.state(CapabilityKind::Definition).enabled);
    }

    #[rstest]
    #[case(ServerCapabilitySet::new().with_completion(true), CapabilityKind::Completion)]
    #[case(ServerCapabilitySet::new().with_code_action(true), CapabilityKind::CodeAction)]
    fn editing_providers_enable_their_capability(
        #[case] advertised: ServerCapabilitySet,
        #[case] capability: CapabilityKind,
    ) {
        let summary = resolve_capabilities(&advertised);

        assert!(summary.state(capability).enabled);
        let others = [CapabilityKind::Completion, CapabilityKind::CodeAction]
            .into_iter()
            .filter(|kind| *kind != capability);
        for other in others {
            assert_eq!(
                summary.state(other).source,
                CapabilitySource::MissingOnServer
            );
        }
    }
}

use serde::{Deserialize, Serialize};
use sync_core::DdlKind;

/// An optional operation a connector may implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    BatchRead,
    StreamRead,
    AdvancedFilter,
    CreateTable,
    DropTable,
    ClearTable,
    CreateIndex,
    WriteRecord,
    BatchCount,
    NewField,
    AlterFieldName,
    AlterFieldAttributes,
    DropField,
    ExecuteCommand,
    GetTableInfo,
}

impl Capability {
    pub const ALL: [Capability; 15] = [
        Capability::BatchRead,
        Capability::StreamRead,
        Capability::AdvancedFilter,
        Capability::CreateTable,
        Capability::DropTable,
        Capability::ClearTable,
        Capability::CreateIndex,
        Capability::WriteRecord,
        Capability::BatchCount,
        Capability::NewField,
        Capability::AlterFieldName,
        Capability::AlterFieldAttributes,
        Capability::DropField,
        Capability::ExecuteCommand,
        Capability::GetTableInfo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::BatchRead => "batch_read",
            Capability::StreamRead => "stream_read",
            Capability::AdvancedFilter => "advanced_filter",
            Capability::CreateTable => "create_table",
            Capability::DropTable => "drop_table",
            Capability::ClearTable => "clear_table",
            Capability::CreateIndex => "create_index",
            Capability::WriteRecord => "write_record",
            Capability::BatchCount => "batch_count",
            Capability::NewField => "new_field",
            Capability::AlterFieldName => "alter_field_name",
            Capability::AlterFieldAttributes => "alter_field_attributes",
            Capability::DropField => "drop_field",
            Capability::ExecuteCommand => "execute_command",
            Capability::GetTableInfo => "get_table_info",
        }
    }

    /// Look up a capability by its operation name.
    pub fn from_name(name: &str) -> Option<Capability> {
        Self::ALL.into_iter().find(|c| c.as_str() == name)
    }

    /// The capability that applies schema changes of `kind`.
    pub fn for_ddl(kind: DdlKind) -> Capability {
        match kind {
            DdlKind::NewField => Capability::NewField,
            DdlKind::AlterFieldName => Capability::AlterFieldName,
            DdlKind::AlterFieldAttributes => Capability::AlterFieldAttributes,
            DdlKind::DropField => Capability::DropField,
            DdlKind::CreateTable => Capability::CreateTable,
            DdlKind::DropTable => Capability::DropTable,
            DdlKind::CreateIndex => Capability::CreateIndex,
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

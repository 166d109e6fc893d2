//! Initial database migration.
//!
//! Creates the enums and every table of the ledger, the directory and the
//! collections.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // ============================================================
        // PART 1: ENUMS
        // ============================================================
        db.execute_unprepared(ENUMS_SQL).await?;

        // ============================================================
        // PART 2: LEDGER
        // ============================================================
        db.execute_unprepared(BANK_ACCOUNTS_SQL).await?;
        db.execute_unprepared(BANK_OPERATIONS_SQL).await?;

        // ============================================================
        // PART 3: DIRECTORY
        // ============================================================
        db.execute_unprepared(PARENTS_SQL).await?;
        db.execute_unprepared(CLASS_GROUPS_SQL).await?;
        db.execute_unprepared(CHILDREN_SQL).await?;
        db.execute_unprepared(CLASS_GROUP_ROLES_SQL).await?;

        // ============================================================
        // PART 4: COLLECTIONS
        // ============================================================
        db.execute_unprepared(COLLECTIONS_SQL).await?;
        db.execute_unprepared(COLLECTION_OPERATIONS_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_ALL_SQL).await?;
        Ok(())
    }
}

// ============================================================
// SQL CONSTANTS
// ============================================================

const ENUMS_SQL: &str = r"
CREATE TYPE collection_status AS ENUM (
    'OPEN',
    'CANCELLED',
    'BLOCKED',
    'FINISHED',
    'NOT_PAID_BEFORE_DEADLINE'
);

CREATE TYPE collection_operation_type AS ENUM ('PAY', 'DISCHARGE', 'REFUND');

CREATE TYPE parent_role AS ENUM ('MEMBER', 'CASHIER');
";

const BANK_ACCOUNTS_SQL: &str = r"
CREATE TABLE bank_accounts (
    id UUID PRIMARY KEY,
    account_number CHAR(26) NOT NULL,
    is_locked BOOLEAN NOT NULL DEFAULT false,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT uq_bank_accounts_number UNIQUE (account_number),
    CONSTRAINT chk_account_number_digits CHECK (account_number ~ '^[0-9]{26}$')
);
";

const BANK_OPERATIONS_SQL: &str = r"
-- Append-only: rows are never updated or deleted
CREATE TABLE bank_operations (
    id BIGSERIAL PRIMARY KEY,
    operation_date TIMESTAMPTZ NOT NULL DEFAULT now(),
    amount NUMERIC(14, 2) NOT NULL,
    title VARCHAR(255) NOT NULL,
    description TEXT,
    source_account_id UUID REFERENCES bank_accounts(id),
    destination_account_id UUID REFERENCES bank_accounts(id),
    CONSTRAINT chk_amount_positive CHECK (amount > 0),
    CONSTRAINT chk_has_side CHECK (
        source_account_id IS NOT NULL OR destination_account_id IS NOT NULL
    ),
    CONSTRAINT chk_distinct_sides CHECK (source_account_id <> destination_account_id)
);

-- Balance derivation scans both sides
CREATE INDEX idx_bank_operations_source ON bank_operations(source_account_id);
CREATE INDEX idx_bank_operations_destination ON bank_operations(destination_account_id);
";

const PARENTS_SQL: &str = r"
CREATE TABLE parents (
    id UUID PRIMARY KEY,
    user_id UUID NOT NULL,
    name VARCHAR(100) NOT NULL,
    surname VARCHAR(100) NOT NULL,
    bank_account_id UUID NOT NULL REFERENCES bank_accounts(id),
    CONSTRAINT uq_parents_user UNIQUE (user_id),
    CONSTRAINT uq_parents_account UNIQUE (bank_account_id)
);
";

const CLASS_GROUPS_SQL: &str = r"
CREATE TABLE class_groups (
    id UUID PRIMARY KEY,
    name VARCHAR(100) NOT NULL,
    description TEXT,
    CONSTRAINT uq_class_groups_name UNIQUE (name)
);
";

const CHILDREN_SQL: &str = r"
CREATE TABLE children (
    id UUID PRIMARY KEY,
    name VARCHAR(100) NOT NULL,
    surname VARCHAR(100) NOT NULL,
    class_group_id UUID NOT NULL REFERENCES class_groups(id)
);

CREATE INDEX idx_children_class ON children(class_group_id);

CREATE TABLE parenthoods (
    parent_id UUID NOT NULL REFERENCES parents(id) ON DELETE CASCADE,
    child_id UUID NOT NULL REFERENCES children(id) ON DELETE CASCADE,
    PRIMARY KEY (parent_id, child_id)
);

CREATE INDEX idx_parenthoods_child ON parenthoods(child_id);
";

const CLASS_GROUP_ROLES_SQL: &str = r"
CREATE TABLE class_group_roles (
    class_group_id UUID NOT NULL REFERENCES class_groups(id) ON DELETE CASCADE,
    parent_id UUID NOT NULL REFERENCES parents(id) ON DELETE CASCADE,
    role parent_role NOT NULL DEFAULT 'MEMBER',
    PRIMARY KEY (class_group_id, parent_id)
);

-- Exactly one cashier per class
CREATE UNIQUE INDEX uq_class_group_cashier
    ON class_group_roles(class_group_id)
    WHERE role = 'CASHIER';
";

const COLLECTIONS_SQL: &str = r"
CREATE TABLE collections (
    id UUID PRIMARY KEY,
    name VARCHAR(255) NOT NULL,
    description TEXT,
    start_date TIMESTAMPTZ NOT NULL,
    end_date TIMESTAMPTZ,
    price NUMERIC(14, 2) NOT NULL,
    status collection_status NOT NULL DEFAULT 'OPEN',
    class_group_id UUID NOT NULL REFERENCES class_groups(id),
    bank_account_id UUID NOT NULL REFERENCES bank_accounts(id),
    owner_id UUID NOT NULL REFERENCES parents(id),
    withdrawn_money NUMERIC(14, 2) NOT NULL DEFAULT 0,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT uq_collections_account UNIQUE (bank_account_id),
    CONSTRAINT chk_price_positive CHECK (price > 0),
    CONSTRAINT chk_withdrawn_non_negative CHECK (withdrawn_money >= 0),
    CONSTRAINT chk_dates CHECK (end_date IS NULL OR end_date >= start_date)
);

CREATE INDEX idx_collections_class ON collections(class_group_id, created_at);
";

const COLLECTION_OPERATIONS_SQL: &str = r"
CREATE TABLE collection_operations (
    id BIGSERIAL PRIMARY KEY,
    child_id UUID NOT NULL REFERENCES children(id),
    collection_id UUID NOT NULL REFERENCES collections(id) ON DELETE CASCADE,
    operation_type collection_operation_type NOT NULL,
    requester_id UUID NOT NULL REFERENCES parents(id),
    operation_date TIMESTAMPTZ NOT NULL DEFAULT now(),
    payment_id BIGINT REFERENCES bank_operations(id),
    CONSTRAINT uq_collection_operations_payment UNIQUE (payment_id)
);

-- Effective row lookup: latest (operation_date, id) per child
CREATE INDEX idx_collection_operations_effective
    ON collection_operations(collection_id, child_id, operation_date DESC, id DESC);
";

const DROP_ALL_SQL: &str = r"
DROP TABLE IF EXISTS collection_operations CASCADE;
DROP TABLE IF EXISTS collections CASCADE;
DROP TABLE IF EXISTS class_group_roles CASCADE;
DROP TABLE IF EXISTS parenthoods CASCADE;
DROP TABLE IF EXISTS children CASCADE;
DROP TABLE IF EXISTS class_groups CASCADE;
DROP TABLE IF EXISTS parents CASCADE;
DROP TABLE IF EXISTS bank_operations CASCADE;
DROP TABLE IF EXISTS bank_accounts CASCADE;
DROP TYPE IF EXISTS parent_role;
DROP TYPE IF EXISTS collection_operation_type;
DROP TYPE IF EXISTS collection_status;
";

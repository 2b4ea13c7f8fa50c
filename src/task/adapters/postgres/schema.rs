//! Diesel schema for task lifecycle persistence.

diesel::table! {
    /// Task records placed within pipeline stages.
    tasks (id) {
        /// Internal task identifier.
        id -> Uuid,
        /// Owning workspace.
        workspace_id -> Int8,
        /// Owning pipeline.
        pipeline_id -> Int8,
        /// Stage position within the pipeline.
        stage_id -> Int8,
        /// Target database.
        database_id -> Int8,
        /// Task name.
        #[max_length = 255]
        name -> Varchar,
        /// Task type, duplicated from the payload tag for querying.
        #[max_length = 100]
        task_type -> Varchar,
        /// Trigger condition.
        #[max_length = 20]
        trigger_when -> Varchar,
        /// Tagged task payload.
        payload -> Jsonb,
        /// Task lifecycle status.
        #[max_length = 20]
        status -> Varchar,
        /// Creating principal.
        creator_id -> Int8,
        /// Latest updating principal.
        updater_id -> Int8,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last update timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Execution attempts recorded against tasks.
    task_runs (id) {
        /// Internal run identifier.
        id -> Uuid,
        /// Owning task.
        task_id -> Uuid,
        /// 1-based attempt number.
        attempt -> Int4,
        /// Run status.
        #[max_length = 20]
        status -> Varchar,
        /// Principal that started the run.
        creator_id -> Int8,
        /// Latest updating principal.
        updater_id -> Int8,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last update timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::joinable!(task_runs -> tasks (task_id));
diesel::allow_tables_to_appear_in_same_query!(tasks, task_runs);

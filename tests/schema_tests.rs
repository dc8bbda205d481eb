use jobboard_schema::{
    ColumnDefinition, DependencyGraph, Error, MigrationPlan, OnDelete, SchemaRegistry, SqlType,
    TableDefinition,
};

fn position(order: &[String], table: &str) -> usize {
    order.iter().position(|t| t == table).unwrap()
}

#[test]
fn test_job_board_declares_eight_tables() {
    let registry = SchemaRegistry::job_board();
    assert_eq!(
        registry.names(),
        vec![
            "users",
            "employer_profiles",
            "job_seeker_profiles",
            "education",
            "experience",
            "jobs",
            "applications",
            "saved_jobs",
        ]
    );
}

#[test]
fn test_every_declared_table_creates_in_sqlite() {
    let conn = rusqlite::Connection::open_in_memory().unwrap();
    conn.execute_batch("PRAGMA foreign_keys = ON").unwrap();
    let registry = SchemaRegistry::job_board();
    let graph = DependencyGraph::from_registry(&registry).unwrap();

    for name in graph.creation_order() {
        let table = registry.get(&name).unwrap();
        conn.execute_batch(&table.create_sql()).unwrap();
        for sql in table.index_sql() {
            conn.execute_batch(&sql).unwrap();
        }
    }

    let mut stmt = conn
        .prepare("SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name")
        .unwrap();
    let live: Vec<String> = stmt
        .query_map([], |r| r.get(0))
        .unwrap()
        .collect::<rusqlite::Result<_>>()
        .unwrap();
    let mut declared: Vec<String> = registry.names().into_iter().map(String::from).collect();
    declared.sort();
    assert_eq!(live, declared);
}

#[test]
fn test_creation_order_puts_referenced_tables_first() {
    let registry = SchemaRegistry::job_board();
    let graph = DependencyGraph::from_registry(&registry).unwrap();
    let order = graph.creation_order();

    for edge in graph.edges() {
        assert!(
            position(&order, &edge.referenced) < position(&order, &edge.dependent),
            "{} must be created before {}",
            edge.referenced,
            edge.dependent
        );
    }
}

#[test]
fn test_cascade_lists_dependents_before_what_they_reference() {
    let registry = SchemaRegistry::job_board();
    let graph = DependencyGraph::from_registry(&registry).unwrap();

    for table in registry.names() {
        let drop_order = graph.drop_order_for(table).unwrap();
        assert_eq!(drop_order.last().unwrap(), table);

        for edge in graph.edges() {
            if drop_order.contains(&edge.dependent) && drop_order.contains(&edge.referenced) {
                assert!(
                    position(&drop_order, &edge.dependent) < position(&drop_order, &edge.referenced),
                    "dropping {}: {} must go before {}",
                    table,
                    edge.dependent,
                    edge.referenced
                );
            }
        }
    }
}

#[test]
fn test_cascade_for_users_reaches_every_other_table() {
    let graph = DependencyGraph::from_registry(&SchemaRegistry::job_board()).unwrap();
    let cascade = graph.cascade_for("users").unwrap();

    assert_eq!(cascade.len(), 7);
    assert!(!cascade.contains(&"users".to_string()));
    assert!(position(&cascade, "education") < position(&cascade, "job_seeker_profiles"));
    assert!(position(&cascade, "applications") < position(&cascade, "jobs"));
}

#[test]
fn test_leaf_table_has_empty_cascade() {
    let graph = DependencyGraph::from_registry(&SchemaRegistry::job_board()).unwrap();
    assert!(graph.cascade_for("saved_jobs").unwrap().is_empty());
    assert!(graph.cascade_for("education").unwrap().is_empty());
}

#[test]
fn test_rebuild_plan_for_jobs() {
    let graph = DependencyGraph::from_registry(&SchemaRegistry::job_board()).unwrap();
    let plan = MigrationPlan::rebuild("jobs", &graph).unwrap();

    assert_eq!(plan.drops(), vec!["saved_jobs", "applications", "jobs"]);
    assert_eq!(plan.recreates(), vec!["jobs", "applications", "saved_jobs"]);
    assert_eq!(plan.dependents(), vec!["applications", "saved_jobs"]);
}

#[test]
fn test_cycle_is_rejected() {
    let a = TableDefinition::new("a")
        .column(ColumnDefinition::id())
        .column(ColumnDefinition::new("b_id", SqlType::Integer))
        .foreign_key("b_id", "b", OnDelete::Cascade);
    let b = TableDefinition::new("b")
        .column(ColumnDefinition::id())
        .column(ColumnDefinition::new("a_id", SqlType::Integer))
        .foreign_key("a_id", "a", OnDelete::Cascade);

    let result = DependencyGraph::from_registry(&SchemaRegistry::new(vec![a, b]));
    assert!(matches!(result, Err(Error::Cycle(_))));
}

#[test]
fn test_reference_to_undeclared_table_is_rejected() {
    let orphan = TableDefinition::new("watchlists")
        .column(ColumnDefinition::id())
        .column(ColumnDefinition::new("company_id", SqlType::Integer))
        .foreign_key("company_id", "companies", OnDelete::Cascade);

    match DependencyGraph::from_registry(&SchemaRegistry::new(vec![orphan])) {
        Err(Error::UndeclaredReference { table, referenced }) => {
            assert_eq!(table, "watchlists");
            assert_eq!(referenced, "companies");
        }
        other => panic!("expected undeclared reference, got {:?}", other.map(|g| g.creation_order())),
    }
}

#[test]
fn test_unknown_table_lookup() {
    let graph = DependencyGraph::from_registry(&SchemaRegistry::job_board()).unwrap();
    assert!(matches!(graph.cascade_for("companies"), Err(Error::UnknownTable(_))));
}

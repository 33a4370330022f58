#[cfg(test)]
mod tests {
    use crate::*;

    fn run(source: &str, expected: Option<VariableType>) -> Result<Option<Value>> {
        let mut script = Script::from_source("test", source)?;
        script.execute(&mut NoNatives, expected)
    }

    fn counter_bylaw() -> Bylaw {
        let mut bylaw = Bylaw::new("main").expect("bylaw");
        bylaw
            .add_integer_variable("counter", 1, VariableAccess::Persistent)
            .expect("counter");
        bylaw
            .add_integer_variable("rate", 5, VariableAccess::Constant)
            .expect("rate");
        bylaw
            .add_string_variable("status", "open", VariableAccess::Important)
            .expect("status");
        bylaw
    }

    #[test]
    fn variable_rejects_wrong_type_and_constant_writes() {
        let mut v = Variable::integer("amount", 10, VariableAccess::Persistent);
        let err = v.set_value(Value::from("ten")).expect_err("type mismatch");
        assert!(matches!(
            err,
            EngineError::TypeMismatch {
                expected: VariableType::Integer,
                found: VariableType::String,
                ..
            }
        ));

        let mut c = Variable::boolean("locked", true, VariableAccess::Constant);
        assert!(matches!(
            c.set_value(Value::Bool(false)),
            Err(EngineError::ConstantModified { .. })
        ));
        assert_eq!(c.value(), &Value::Bool(true));
    }

    #[test]
    fn variable_dirty_tracking() {
        let mut v = Variable::string("note", "a", VariableAccess::Important);
        assert!(!v.is_dirty());
        v.set_value(Value::from("b")).expect("set");
        assert!(v.is_dirty());
        assert_eq!(v.clean_value(), &Value::from("a"));
        v.set_as_clean();
        assert!(!v.is_dirty());
        v.set_value(Value::from("c")).expect("set");
        v.restore_clean();
        assert_eq!(v.value(), &Value::from("b"));
        assert!(v.is_persistent());
        assert!(v.is_important());
    }

    #[test]
    fn variable_type_and_access_strings() {
        assert_eq!("integer".parse::<VariableType>(), Ok(VariableType::Integer));
        assert_eq!(VariableAccess::Important.to_string(), "important");
        assert!("float".parse::<VariableType>().is_err());
        assert!("secret".parse::<VariableAccess>().is_err());
    }

    #[test]
    fn variable_deserialize_checks_declared_type() {
        let ok: Variable = serde_json::from_str(
            r#"{"name":"n","type":"integer","access":"persistent","value":3}"#,
        )
        .expect("valid variable");
        assert_eq!(ok.value(), &Value::Int(3));
        let bad = serde_json::from_str::<Variable>(
            r#"{"name":"n","type":"bool","access":"persistent","value":"yes"}"#,
        );
        assert!(bad.is_err());
    }

    #[test]
    fn names_reject_reserved_prefixes_and_bad_characters() {
        let mut bylaw = Bylaw::new("main").expect("bylaw");
        assert!(bylaw
            .add_integer_variable("hook_x", 1, VariableAccess::Persistent)
            .is_err());
        assert!(bylaw.add_clause("cron_tick", "1;").is_err());
        assert!(bylaw.add_clause("9lives", "1;").is_err());
        assert!(bylaw.add_clause("has space", "1;").is_err());
        assert!(Bylaw::new("").is_err());
        assert!(bylaw.add_hook("on_activate", "anything").is_err());
        assert!(bylaw.add_callback("hook_wrong", "anything").is_err());
    }

    #[test]
    fn bylaw_duplicates_are_rejected() {
        let mut bylaw = counter_bylaw();
        assert!(matches!(
            bylaw.add_integer_variable("counter", 2, VariableAccess::Persistent),
            Err(EngineError::DuplicateName { kind: "variable", .. })
        ));
        bylaw.add_clause("pay", "1;").expect("clause");
        assert!(bylaw.add_clause("pay", "2;").is_err());
        bylaw.add_hook("cron_process", "pay").expect("hook");
        assert!(bylaw.add_hook("cron_process", "pay").is_err());
        bylaw
            .add_callback(names::CALLBACK_PARTY_MAY_CANCEL, "pay")
            .expect("callback");
        assert!(bylaw
            .add_callback(names::CALLBACK_PARTY_MAY_CANCEL, "pay")
            .is_err());
    }

    #[test]
    fn hooks_keep_registration_order_and_skip_missing_clauses() {
        let mut bylaw = Bylaw::new("main").expect("bylaw");
        bylaw.add_clause("zeta", "1;").expect("zeta");
        bylaw.add_clause("alpha", "2;").expect("alpha");
        bylaw.add_hook("cron_process", "zeta").expect("hook");
        bylaw.add_hook("cron_process", "ghost").expect("hook");
        bylaw.add_hook("cron_process", "alpha").expect("hook");
        let names: Vec<&str> = bylaw
            .hooks("cron_process")
            .into_iter()
            .map(Clause::name)
            .collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
        assert!(bylaw.hooks("cron_activate").is_empty());
    }

    #[test]
    fn removing_a_clause_drops_its_routes() {
        let mut bylaw = Bylaw::new("main").expect("bylaw");
        bylaw.add_clause("check", "true;").expect("clause");
        bylaw.add_hook("hook_deactivate", "check").expect("hook");
        bylaw
            .add_callback(names::CALLBACK_PARTY_MAY_EXECUTE, "check")
            .expect("callback");
        bylaw.remove_clause("check").expect("remove");
        assert_eq!(bylaw.hook_names().count(), 0);
        assert!(bylaw.callback(names::CALLBACK_PARTY_MAY_EXECUTE).is_none());
        assert!(bylaw.remove_clause("check").is_err());
    }

    #[test]
    fn bylaw_removes_hooks_callbacks_and_variables() {
        let mut bylaw = counter_bylaw();
        bylaw.add_clause("pay", "1;").expect("pay");
        bylaw.add_clause("audit", "2;").expect("audit");
        bylaw.add_hook("cron_process", "pay").expect("hook");
        bylaw.add_hook("cron_process", "audit").expect("hook");
        bylaw
            .add_callback(names::CALLBACK_PARTY_MAY_CANCEL, "audit")
            .expect("callback");

        bylaw.remove_hook("cron_process", "pay").expect("remove hook");
        let names: Vec<&str> = bylaw
            .hooks("cron_process")
            .into_iter()
            .map(Clause::name)
            .collect();
        assert_eq!(names, vec!["audit"]);
        assert!(bylaw.remove_hook("cron_process", "pay").is_err());
        bylaw.remove_hook("cron_process", "audit").expect("remove hook");
        assert_eq!(bylaw.hook_names().count(), 0);
        assert!(bylaw.remove_hook("cron_process", "audit").is_err());

        bylaw
            .remove_callback(names::CALLBACK_PARTY_MAY_CANCEL)
            .expect("remove callback");
        assert!(bylaw.callback(names::CALLBACK_PARTY_MAY_CANCEL).is_none());
        assert!(bylaw.remove_callback(names::CALLBACK_PARTY_MAY_CANCEL).is_err());
        assert!(bylaw.clause("audit").is_some());

        let removed = bylaw.remove_variable("rate").expect("remove variable");
        assert_eq!(removed.value(), &Value::Int(5));
        assert!(bylaw.variable("rate").is_none());
        assert_eq!(bylaw.variable_count(), 2);
        assert!(matches!(
            bylaw.remove_variable("rate"),
            Err(EngineError::NotFound { kind: "variable", .. })
        ));
    }

    #[test]
    fn bylaw_name_problems_catch_json_that_skipped_checks() {
        let bylaw: Bylaw = serde_json::from_str(
            r#"{
                "name": "main",
                "variables": {
                    "x": {"name":"cron_evil","type":"integer","access":"persistent","value":1}
                },
                "clauses": {"hook_c": {"name":"hook_c","code":"1;"}},
                "hooks": {"on_tick": ["hook_c"]},
                "callbacks": {"party_may_cancel": "hook_c"}
            }"#,
        )
        .expect("decode bylaw");
        let problems = bylaw.name_problems();
        assert!(problems.iter().any(|p| p.contains("cron_evil") && p.contains("reserved prefix")));
        assert!(problems.iter().any(|p| p.contains("mismatched key 'x'")));
        assert!(problems.iter().any(|p| p.contains("clause 'hook_c'")));
        assert!(problems.iter().any(|p| p.contains("hook 'on_tick'")));
        assert!(problems
            .iter()
            .any(|p| p.contains("callback 'party_may_cancel'")));
        assert!(counter_bylaw().name_problems().is_empty());
    }

    #[test]
    fn bylaw_compare_and_index_lookup() {
        let a = counter_bylaw();
        let mut b = counter_bylaw();
        assert!(a.compare(&b));
        assert_eq!(a.variable_by_index(0).map(Variable::name), Some("counter"));
        b.variable_mut("counter")
            .expect("counter")
            .set_value(Value::Int(9))
            .expect("set");
        assert!(!a.compare(&b));
    }

    #[test]
    fn script_returns_last_expression_or_explicit_return() {
        assert_eq!(
            run("var a = 2; a * 3;", Some(VariableType::Integer)).expect("run"),
            Some(Value::Int(6))
        );
        assert_eq!(
            run("if (1 < 2) { return \"yes\"; } \"no\";", None).expect("run"),
            Some(Value::from("yes"))
        );
        assert_eq!(run("var a = 1;", None).expect("run"), None);
    }

    #[test]
    fn script_checks_expected_return_type() {
        assert!(matches!(
            run("var a = 1;", Some(VariableType::Bool)),
            Err(EngineError::MissingReturn { .. })
        ));
        assert!(matches!(
            run("return 1;", Some(VariableType::Bool)),
            Err(EngineError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn script_loops_and_string_concatenation() {
        let source = r#"
var i = 0;
var out = "";
while (i < 3) {
    out = out + i;
    i += 1;
}
out + "!";
"#;
        assert_eq!(run(source, None).expect("run"), Some(Value::from("012!")));
    }

    #[test]
    fn script_logical_operators_short_circuit() {
        // The right side would fail with division by zero if evaluated.
        assert_eq!(
            run("false && (1 / 0 == 1);", None).expect("run"),
            Some(Value::Bool(false))
        );
        assert_eq!(
            run("true || (1 / 0 == 1);", None).expect("run"),
            Some(Value::Bool(true))
        );
    }

    #[test]
    fn script_runtime_errors_carry_spans() {
        let err = run("var a = 1;\nvar b = a / 0;", None).expect_err("division by zero");
        match err {
            EngineError::Runtime { message, span } => {
                assert!(message.contains("division by zero"));
                assert_eq!(span.line, 2);
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(matches!(
            run("if (1) { }", None),
            Err(EngineError::Runtime { .. })
        ));
        assert!(matches!(
            run("9223372036854775807 + 1;", None),
            Err(EngineError::Runtime { .. })
        ));
        assert!(matches!(
            run("1 == \"1\";", None),
            Err(EngineError::Runtime { .. })
        ));
        assert!(matches!(run("missing;", None), Err(EngineError::Runtime { .. })));
    }

    #[test]
    fn script_builtins() {
        assert_eq!(
            run("strlen(to_string(12345));", None).expect("run"),
            Some(Value::Int(5))
        );
        assert_eq!(
            run("to_int(\" 42 \") + 1;", None).expect("run"),
            Some(Value::Int(43))
        );
        assert!(run("to_int(\"x\");", None).is_err());
        assert!(matches!(
            run("launch_rockets();", None),
            Err(EngineError::UnknownFunction { .. })
        ));
    }

    #[test]
    fn script_step_and_depth_limits() {
        let mut script = Script::from_source("spin", "while (true) { }")
            .expect("parse")
            .with_limits(ScriptLimits {
                max_steps: 1_000,
                max_depth: 64,
            });
        assert!(matches!(
            script.execute(&mut NoNatives, None),
            Err(EngineError::StepLimitExceeded { limit: 1_000 })
        ));

        let mut script = Script::from_source("deep", "1 + (2 + (3 + 4));")
            .expect("parse")
            .with_limits(ScriptLimits {
                max_steps: 1_000,
                max_depth: 3,
            });
        assert!(matches!(
            script.execute(&mut NoNatives, None),
            Err(EngineError::DepthLimitExceeded { limit: 3 })
        ));
    }

    #[test]
    fn long_flat_sums_stay_within_default_depth() {
        let terms: Vec<String> = (1..=200).map(|n| n.to_string()).collect();
        let source = format!("return {};", terms.join(" + "));
        let mut script = Script::from_source("sum", &source).expect("parse");
        assert_eq!(
            script.execute(&mut NoNatives, Some(VariableType::Integer)).expect("run"),
            Some(Value::Int(20_100))
        );
    }

    #[test]
    fn script_writes_through_to_bylaw_variables() {
        let mut bylaw = counter_bylaw();
        {
            let mut script =
                Script::from_source("inc", "counter += rate; status = \"busy\";").expect("parse");
            bylaw.register_variables_for_execution(&mut script);
            assert!(script.find_variable("rate").is_some());
            script.execute(&mut NoNatives, None).expect("run");
        }
        assert_eq!(bylaw.variable("counter").map(Variable::value), Some(&Value::Int(6)));
        assert!(bylaw.is_dirty());
        assert!(bylaw.is_dirty_important());
        let dirty: Vec<&str> = bylaw.dirty_variables().map(Variable::name).collect();
        assert_eq!(dirty, vec!["counter", "status"]);
        bylaw.set_as_clean();
        assert!(!bylaw.is_dirty());
    }

    #[test]
    fn script_variables_can_be_unbound_before_running() {
        let mut bylaw = counter_bylaw();
        {
            let mut script = Script::from_source("inc", "counter += 1;").expect("parse");
            bylaw.register_variables_for_execution(&mut script);
            assert_eq!(
                script.find_variable("counter").map(Variable::value),
                Some(&Value::Int(1))
            );
            let removed = script.remove_variable("counter").expect("bound");
            assert_eq!(removed.name(), "counter");
            assert!(script.find_variable("counter").is_none());
            assert!(script.remove_variable("counter").is_none());
            assert!(script.execute(&mut NoNatives, None).is_err());
        }
        assert_eq!(bylaw.variable("counter").map(Variable::value), Some(&Value::Int(1)));
    }

    #[test]
    fn script_rejects_constant_and_binding_writes() {
        let mut bylaw = counter_bylaw();
        {
            let mut script = Script::from_source("bad", "rate = 6;").expect("parse");
            bylaw.register_variables_for_execution(&mut script);
            assert!(matches!(
                script.execute(&mut NoNatives, None),
                Err(EngineError::ConstantModified { .. })
            ));
        }
        {
            let mut script = Script::from_source("bad", "counter = \"many\";").expect("parse");
            bylaw.register_variables_for_execution(&mut script);
            assert!(matches!(
                script.execute(&mut NoNatives, None),
                Err(EngineError::TypeMismatch { .. })
            ));
        }

        let mut script = Script::from_source("who", "alice = \"bob\";").expect("parse");
        script.add_party("alice");
        assert!(matches!(
            script.execute(&mut NoNatives, None),
            Err(EngineError::ReadOnlyBinding { .. })
        ));

        let mut script = Script::from_source("who", "var acct_a = 1;").expect("parse");
        script.add_account("acct_a");
        assert!(matches!(
            script.execute(&mut NoNatives, None),
            Err(EngineError::Runtime { .. })
        ));
    }

    #[test]
    fn party_and_account_names_read_as_strings() {
        let mut script =
            Script::from_source("greet", "return alice + \" pays from \" + acct_a;").expect("parse");
        script.add_party("alice");
        script.add_account("acct_a");
        assert_eq!(
            script.execute(&mut NoNatives, Some(VariableType::String)).expect("run"),
            Some(Value::from("alice pays from acct_a"))
        );
    }

    #[test]
    fn locals_are_block_scoped() {
        assert!(matches!(
            run("if (true) { var inner = 1; } inner;", None),
            Err(EngineError::Runtime { .. })
        ));
        assert_eq!(
            run("var x = 1; if (true) { var x = 2; } x;", None).expect("run"),
            Some(Value::Int(1))
        );
        assert!(run("var y; y + 1;", None).is_err());
    }

    #[test]
    fn clause_compile_reports_clause_name() {
        let clause = Clause::new("broken", "var = ;");
        match clause.compile() {
            Err(EngineError::Parse { clause, errors }) => {
                assert_eq!(clause, "broken");
                assert!(!errors.is_empty());
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn agent_kinds() {
        let me = Agent::individual("alice_agent", "nym_alice").expect("agent");
        assert!(me.is_an_individual());
        assert!(me.does_represent_himself("nym_alice"));
        assert!(me.is_valid_signer("nym_alice"));
        assert_eq!(me.role_id(), None);

        let officer = Agent::new(
            "cfo",
            AgentKind::RoleHolder {
                role_id: "role_cfo".into(),
                nym_id: "nym_carol".into(),
            },
        )
        .expect("agent");
        assert!(officer.is_an_individual());
        assert!(!officer.does_represent_himself("nym_carol"));
        assert_eq!(officer.role_id(), Some("role_cfo"));

        let board = Agent::new(
            "board",
            AgentKind::Group {
                group_name: "directors".into(),
            },
        )
        .expect("agent");
        assert!(!board.is_an_individual());
        assert!(!board.is_valid_signer("nym_carol"));
        assert_eq!(board.nym_id(), None);
    }

    #[test]
    fn party_account_verification() {
        let mut ledger = InMemoryLedger::new();
        ledger
            .open_account("A-1", "nym_alice", "usd", 100)
            .expect("open");
        ledger
            .open_account("A-2", "nym_bob", "usd", 100)
            .expect("open");

        let mut party = Party::new("alice", PartyOwner::Nym("nym_alice".into()), "alice_agent")
            .expect("party");
        party
            .add_agent(Agent::individual("alice_agent", "nym_alice").expect("agent"))
            .expect("add agent");
        assert!(party
            .add_account(PartyAccount::new("acct_x", "A-1", "usd", "nobody").expect("account"))
            .is_err());
        party
            .add_account(PartyAccount::new("acct_alice", "A-1", "usd", "alice_agent").expect("account"))
            .expect("add account");
        party
            .add_account(PartyAccount::new("acct_stolen", "A-2", "usd", "alice_agent").expect("account"))
            .expect("add account");

        assert!(party.verify_ownership_of_account("acct_alice", &ledger));
        assert!(!party.verify_ownership_of_account("acct_stolen", &ledger));
        assert!(!party.verify_ownership_of_accounts(&ledger));
        assert_eq!(party.account_by_id("A-1").map(PartyAccount::name), Some("acct_alice"));
        assert_eq!(party.accounts_by_agent("alice_agent").count(), 2);
        assert!(party.has_agent_by_nym_id("nym_alice"));
    }

    #[test]
    fn stash_credit_and_debit() {
        let mut stash = Stash::new("escrow").expect("stash");
        assert_eq!(stash.amount("usd"), 0);
        stash.credit("usd", 40).expect("credit");
        stash.credit("usd", 2).expect("credit");
        assert_eq!(stash.amount("usd"), 42);
        assert!(stash.debit("usd", 50).is_err());
        assert!(stash.credit("usd", 0).is_err());
        assert!(stash.debit("usd", -1).is_err());
        stash.debit("usd", 42).expect("debit");
        assert_eq!(stash.amount("usd"), 0);
    }

    #[test]
    fn ledger_transfer_rules() {
        let mut ledger = InMemoryLedger::new();
        ledger.open_account("A", "n1", "usd", 10).expect("open");
        ledger.open_account("B", "n2", "usd", 0).expect("open");
        ledger.open_account("C", "n3", "gold", 0).expect("open");
        assert!(ledger.open_account("A", "n1", "usd", 0).is_err());

        assert!(ledger.transfer("A", "B", 0).is_err());
        assert!(ledger.transfer("A", "B", 11).is_err());
        assert!(ledger.transfer("A", "C", 1).is_err());
        assert!(ledger.transfer("A", "Z", 1).is_err());
        ledger.transfer("A", "B", 7).expect("transfer");
        assert_eq!(ledger.balance("A").expect("balance"), 3);
        assert_eq!(ledger.balance("B").expect("balance"), 7);
    }
}

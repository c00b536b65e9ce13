//! Statement blocks shared by the integration tests and the benchmarks.
//!
//! Each fixture notes the C source it stands for; line numbers match the
//! spans attached to the statements.

#![allow(dead_code)]

use loopdep::prelude::*;
use std::collections::BTreeSet;

pub fn dependence_strings(deps: &[DataDependence]) -> BTreeSet<String> {
    deps.iter().map(|d| d.to_string()).collect()
}

pub fn expected(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn i(name: &str) -> Expr {
    Expr::var(name)
}

fn plus(name: &str, k: i64) -> Expr {
    match k {
        0 => i(name),
        k if k > 0 => Expr::add(i(name), Expr::int(k)),
        k => Expr::sub(i(name), Expr::int(-k)),
    }
}

/// ```c
/// 2  int one = 1, two, three;
/// 3  two = 2;
/// 4  three = two;
/// 5  three = three + one;
/// ```
pub fn scalar_block() -> Vec<Stmt> {
    vec![
        Stmt::decl(vec![
            Declarator::scalar("one").init(Expr::int(1)),
            Declarator::scalar("two"),
            Declarator::scalar("three"),
        ])
        .at(2),
        Stmt::assign(i("two"), Expr::int(2)).at(3),
        Stmt::assign(i("three"), i("two")).at(4),
        Stmt::assign(i("three"), Expr::add(i("three"), i("one"))).at(5),
    ]
}

/// ```c
/// 2  int v = 1;
/// 3  for (int i = 0; i < 10; i++) {
/// 4    v = v + 1;
/// 5  }
/// ```
pub fn scalar_in_loop() -> Vec<Stmt> {
    vec![
        Stmt::decl(vec![Declarator::scalar("v").init(Expr::int(1))]).at(2),
        Stmt::for_loop(
            "i",
            0,
            10,
            Stmt::compound(vec![Stmt::assign(i("v"), Expr::add(i("v"), Expr::int(1))).at(4)]).spanning(3, 5),
        )
        .spanning(3, 5),
    ]
}

/// ```c
/// 2  int scalar, array[2];
/// 3  scalar = 1;
/// 4  array[0] = scalar;
/// 5  array[1] = array[0];
/// 6  array[0] = array[0];
/// ```
pub fn array_block() -> Vec<Stmt> {
    let elem = |k: i64| Expr::index("array", vec![Expr::int(k)]);
    vec![
        Stmt::decl(vec![Declarator::scalar("scalar"), Declarator::array("array", &[2])]).at(2),
        Stmt::assign(i("scalar"), Expr::int(1)).at(3),
        Stmt::assign(elem(0), i("scalar")).at(4),
        Stmt::assign(elem(1), elem(0)).at(5),
        Stmt::assign(elem(0), elem(0)).at(6),
    ]
}

/// ```c
/// 2  int scalar = 1, array[10];
/// 3  for (int i = 0; i < 10; i++) {
/// 4    array[i] = scalar;
/// 5    array[i] = array[i] + 1;
/// 6  }
/// ```
pub fn array_in_loop() -> Vec<Stmt> {
    let elem = || Expr::index("array", vec![i("i")]);
    vec![
        Stmt::decl(vec![Declarator::scalar("scalar").init(Expr::int(1)), Declarator::array("array", &[10])]).at(2),
        Stmt::for_loop(
            "i",
            0,
            10,
            Stmt::compound(vec![
                Stmt::assign(elem(), i("scalar")).at(4),
                Stmt::assign(elem(), Expr::add(elem(), Expr::int(1))).at(5),
            ])
            .spanning(3, 6),
        )
        .spanning(3, 6),
    ]
}

/// ```c
/// 2  int i, matrix[2][2];            // `i` only when `symbolic`
/// 3  matrix[1][0] = 0;
/// 4  matrix[1][0] = matrix[0][1];    // matrix[i][1] when `symbolic`
/// 5  matrix[0][0] = matrix[1][0];    // matrix[1][i] when `symbolic`
/// ```
pub fn matrix_block(symbolic: bool) -> Vec<Stmt> {
    let m = |a: Expr, b: Expr| Expr::index("matrix", vec![a, b]);
    let k = Expr::int;
    let mut decls = vec![Declarator::array("matrix", &[2, 2])];
    if symbolic {
        decls.insert(0, Declarator::scalar("i"));
    }
    let (read4, read5) = if symbolic {
        (m(i("i"), k(1)), m(k(1), i("i")))
    } else {
        (m(k(0), k(1)), m(k(1), k(0)))
    };
    vec![
        Stmt::decl(decls).at(2),
        Stmt::assign(m(k(1), k(0)), k(0)).at(3),
        Stmt::assign(m(k(1), k(0)), read4).at(4),
        Stmt::assign(m(k(0), k(0)), read5).at(5),
    ]
}

/// ```c
/// 2  double two, negtwo;
/// 3  two = fabs(-2.0);
/// 4  negtwo = -two;
/// ```
pub fn fabs_block() -> Vec<Stmt> {
    vec![
        Stmt::decl(vec![Declarator::scalar("two"), Declarator::scalar("negtwo")]).at(2),
        Stmt::assign(i("two"), Expr::call("fabs", vec![Expr::neg(Expr::float(2.0))])).at(3),
        Stmt::assign(i("negtwo"), Expr::neg(i("two"))).at(4),
    ]
}

/// ```c
/// 2  double value;
/// 3  value = some_function(-2.0);
/// ```
pub fn unknown_call_block() -> Vec<Stmt> {
    vec![
        Stmt::decl(vec![Declarator::scalar("value")]).at(2),
        Stmt::assign(i("value"), Expr::call("some_function", vec![Expr::neg(Expr::float(2.0))])).at(3),
    ]
}

/// ```c
/// 2  double value, a = 1, b = 2, c = 3;
/// 3  double *p = &b;
/// 4  value = some_function(-2.0);
/// 5  value = a + b + c;
/// ```
pub fn pointer_alias_block() -> Vec<Stmt> {
    vec![
        Stmt::decl(vec![
            Declarator::scalar("value"),
            Declarator::scalar("a").init(Expr::int(1)),
            Declarator::scalar("b").init(Expr::int(2)),
            Declarator::scalar("c").init(Expr::int(3)),
        ])
        .at(2),
        Stmt::decl(vec![Declarator::pointer("p").init(Expr::address_of(i("b")))]).at(3),
        Stmt::assign(i("value"), Expr::call("some_function", vec![Expr::neg(Expr::float(2.0))])).at(4),
        Stmt::assign(i("value"), Expr::add(Expr::add(i("a"), i("b")), i("c"))).at(5),
    ]
}

/// `for (int i = lower; i < upper; i++) { a[i] = a[i + offset]; }` at lines 1-2.
pub fn shifted_copy(lower: i64, upper: Expr, offset: i64) -> Stmt {
    let body = Stmt::assign(Expr::index("a", vec![i("i")]), Expr::index("a", vec![plus("i", offset)])).at(2);
    Stmt::counted_loop("i", Expr::int(lower), BinaryOp::Lt, upper, 1, body).spanning(1, 2)
}

/// Livermore kernel 8 (ADI integration), with the loop nest at lines 7-23.
///
/// ```c
///  2  int kx, ky, n = 10, nl1, nl2, sig;
///  3  int a11, a12, a13, a21, a22, a23, a31, a32, a33;
///  4  int du1[1000], du2[1000], du3[1000];
///  5  int u1[1000][1000][1000], u2[1000][1000][1000], u3[1000][1000][1000];
///  7  for (kx = 1; kx < 3; kx++) {
///  9    for (ky = 1; ky < n; ky++) {
/// 10      du1[ky] = u1[nl1][ky+1][kx] - u1[nl1][ky-1][kx];
/// 11      du2[ky] = u2[nl1][ky+1][kx] - u2[nl1][ky-1][kx];
/// 12      du3[ky] = u3[nl1][ky+1][kx] - u3[nl1][ky-1][kx];
/// 13      u1[nl2][ky][kx] = u1[nl1][ky][kx] + a11*du1[ky] + a12*du2[ky] + a13*du3[ky]
/// 14          + sig*(u1[nl1][ky][kx+1] - 2.0*u1[nl1][ky][kx] + u1[nl1][ky][kx-1]);
///     ...   (u2 at 15, u3 at 17)
/// 22    }
/// 23  }
/// ```
pub fn kernel8() -> Stmt {
    let u = |name: &str, plane: &str, dy: i64, dx: i64| {
        Expr::index(name, vec![i(plane), plus("ky", dy), plus("kx", dx)])
    };
    let du = |n: usize| Expr::index(&format!("du{}", n), vec![i("ky")]);

    let mut body = Vec::new();
    for n in 1..=3 {
        let un = format!("u{}", n);
        body.push(
            Stmt::assign(du(n), Expr::sub(u(&un, "nl1", 1, 0), u(&un, "nl1", -1, 0))).at(9 + n),
        );
    }
    for n in 1..=3 {
        let un = format!("u{}", n);
        let coef = |m: usize| i(&format!("a{}{}", n, m));
        let mut rhs = u(&un, "nl1", 0, 0);
        for m in 1..=3 {
            rhs = Expr::add(rhs, Expr::mul(coef(m), du(m)));
        }
        let laplace = Expr::add(
            Expr::sub(u(&un, "nl1", 0, 1), Expr::mul(Expr::float(2.0), u(&un, "nl1", 0, 0))),
            u(&un, "nl1", 0, -1),
        );
        rhs = Expr::add(rhs, Expr::mul(i("sig"), Expr::grouped(laplace)));
        let line = 11 + 2 * n;
        body.push(Stmt::assign(u(&un, "nl2", 0, 0), rhs).spanning(line, line + 1));
    }

    let inner = Stmt::counted_loop("ky", Expr::int(1), BinaryOp::Lt, i("n"), 1, Stmt::compound(body).spanning(9, 22))
        .spanning(9, 22);
    let outer = Stmt::counted_loop("kx", Expr::int(1), BinaryOp::Lt, Expr::int(3), 1, Stmt::compound(vec![inner]))
        .spanning(7, 23);

    let scalars = |names: &[&str]| names.iter().map(|n| Declarator::scalar(n)).collect::<Vec<_>>();
    let mut first = scalars(&["kx", "ky"]);
    first.push(Declarator::scalar("n").init(Expr::int(10)));
    first.extend(scalars(&["nl1", "nl2", "sig"]));

    Stmt::compound(vec![
        Stmt::decl(first).at(2),
        Stmt::decl(scalars(&["a11", "a12", "a13", "a21", "a22", "a23", "a31", "a32", "a33"])).at(3),
        Stmt::decl(["du1", "du2", "du3"].iter().map(|n| Declarator::array(n, &[1000])).collect()).at(4),
        Stmt::decl(["u1", "u2", "u3"].iter().map(|n| Declarator::array(n, &[1000, 1000, 1000])).collect()).at(5),
        without_index_declarations(outer),
    ])
    .spanning(1, 24)
}

/// `for (kx = 1; ...)` assigns an existing variable instead of declaring one.
fn without_index_declarations(mut stmt: Stmt) -> Stmt {
    clear_index_declarations(&mut stmt);
    stmt
}

fn clear_index_declarations(stmt: &mut Stmt) {
    match &mut stmt.kind {
        StmtKind::For(header) => {
            header.declares_index = false;
            clear_index_declarations(&mut header.body);
        }
        StmtKind::Compound(stmts) => stmts.iter_mut().for_each(clear_index_declarations),
        _ => {}
    }
}
